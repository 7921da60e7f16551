//! Plain-text rendering of workspace snapshots
//!
//! Only the parts that changed since the previous snapshot are printed.

use mailsync::{Draft, Item, ItemDetail, ItemId, Snapshot, SyncError};

#[derive(Default)]
pub struct Screen {
    last: Option<Snapshot>,
}

impl Screen {
    pub fn active(&self) -> Option<ItemId> {
        self.last.as_ref().and_then(|s| s.active)
    }

    pub fn render(&mut self, snapshot: Snapshot) {
        let last = self.last.as_ref();
        if last.is_none_or(|l| l.items != snapshot.items || l.active != snapshot.active) {
            print_list(&snapshot);
        }
        if last.is_none_or(|l| l.detail != snapshot.detail)
            && let Some(detail) = &snapshot.detail
        {
            print_detail(detail);
        }
        if last.is_none_or(|l| l.draft != snapshot.draft || l.instruction != snapshot.instruction)
            && let Some(draft) = &snapshot.draft
        {
            print_draft(draft, snapshot.instruction.as_deref());
        }
        self.last = Some(snapshot);
    }

    pub fn error(&self, error: &SyncError) {
        if error.is_user_visible() {
            println!("! {}", error);
        }
    }
}

fn print_list(snapshot: &Snapshot) {
    if let Some(context) = &snapshot.context {
        println!("== {} ({} items) ==", context, snapshot.items.len());
    }
    for item in &snapshot.items {
        let marker = if snapshot.active == Some(item.id) { '>' } else { ' ' };
        println!("{} {}", marker, summary(item));
    }
    if snapshot.list_loading {
        println!("  loading...");
    } else if snapshot.list_failed {
        println!("  page failed; type 'retry'");
    } else if snapshot.has_more {
        println!("  more available; type 'more'");
    }
}

fn summary(item: &Item) -> String {
    let unread = if item.flags.is_read { ' ' } else { '*' };
    let flagged = if item.flags.is_flagged { '!' } else { ' ' };
    format!(
        "{}{} {:>6}  {}  {:<24}  {}",
        unread,
        flagged,
        item.id,
        item.received_at.format("%b %d %H:%M"),
        item.sender,
        item.subject
    )
}

fn print_detail(detail: &ItemDetail) {
    println!("-- {} --", detail.item.subject);
    println!("{}", detail.body);
    for (index, variant) in detail.variants.iter().enumerate() {
        println!("  [{}] {}", index + 1, variant.title);
    }
}

fn print_draft(draft: &Draft, instruction: Option<&str>) {
    let variant = draft
        .selected_variant_index
        .map_or_else(|| "none".to_string(), |i| (i + 1).to_string());
    println!("   draft (variant {}): {}", variant, draft.subject);
    println!("   {}", draft.body);
    if let Some(instruction) = instruction {
        println!("   instruction: {}", instruction);
    }
}
