//! HTTP client for the mailbox data API
//!
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use anyhow::{Context, Result};
use log::debug;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::wire::{
    CorrectRequest, CorrectResponse, DetailResponse, DraftSelectionRequest, HistoryRequest,
    ListResponse, RefineRequest, RefineResponse, UpdateFieldRequest, WireVariant,
};
use super::{Correction, HistoryStep, MailApi, Page, Refinement, TextRange};
use crate::models::{Field, ItemDetail, ItemId, MailContext, Variant, VariantId};

/// HTTP methods that carry a JSON body
#[derive(Debug, Clone, Copy)]
enum Method {
    Patch,
    Post,
}

impl Method {
    fn as_str(&self) -> &'static str {
        match self {
            Method::Patch => "PATCH",
            Method::Post => "POST",
        }
    }
}

/// Data API client authenticated with a bearer token
pub struct HttpMailApi {
    base_url: String,
    token: String,
}

impl HttpMailApi {
    /// Create a new client for the API rooted at `base_url`
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            token: token.into(),
        }
    }

    fn authorization(&self) -> String {
        format!("Bearer {}", self.token)
    }

    fn list_url(&self, context: &MailContext, page: u32, page_size: usize) -> String {
        format!(
            "{}/accounts/{}/folders/{}/items?page={}&pageSize={}",
            self.base_url,
            urlencoding::encode(&context.account_id),
            urlencoding::encode(&context.folder),
            page,
            page_size
        )
    }

    fn send<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: &B,
    ) -> Result<T> {
        debug!("{} {}", method.as_str(), url);
        let request = match method {
            Method::Patch => ureq::patch(url),
            Method::Post => ureq::post(url),
        };

        let mut response = request
            .header("Authorization", &self.authorization())
            .send_json(body)
            .with_context(|| format!("Failed to send {} {}", method.as_str(), url))?;

        response
            .body_mut()
            .read_json()
            .with_context(|| format!("Failed to parse response of {} {}", method.as_str(), url))
    }
}

impl MailApi for HttpMailApi {
    fn list(&self, context: &MailContext, page: u32, page_size: usize) -> Result<Page> {
        let url = self.list_url(context, page, page_size);
        debug!("GET {}", url);

        let mut response = ureq::get(&url)
            .header("Authorization", &self.authorization())
            .call()
            .context("Failed to send list items request")?;

        let list: ListResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse list items response")?;

        Ok(list.into())
    }

    fn detail(&self, id: ItemId) -> Result<Option<ItemDetail>> {
        let url = format!("{}/items/{}", self.base_url, id);
        debug!("GET {}", url);

        let response = ureq::get(&url)
            .header("Authorization", &self.authorization())
            .call();

        match response {
            Ok(mut resp) => {
                let detail: DetailResponse = resp
                    .body_mut()
                    .read_json()
                    .context("Failed to parse item detail response")?;
                Ok(Some(detail.into()))
            }
            // Item was deleted server-side
            Err(ureq::Error::StatusCode(404)) => Ok(None),
            Err(e) => Err(anyhow::anyhow!("Failed to fetch item {}: {}", id, e)),
        }
    }

    fn update_variant_field(
        &self,
        variant_id: VariantId,
        field: Field,
        value: &str,
    ) -> Result<Variant> {
        let url = format!("{}/variants/{}", self.base_url, variant_id);
        let variant: WireVariant = self.send(Method::Patch, &url, &UpdateFieldRequest { field, value })?;
        Ok(variant.into())
    }

    fn correct(
        &self,
        variant_id: VariantId,
        field: Field,
        selection: Option<TextRange>,
    ) -> Result<Correction> {
        let url = format!("{}/variants/{}/correct", self.base_url, variant_id);
        let body = CorrectRequest {
            field,
            selection: selection.map(Into::into),
        };
        let correction: CorrectResponse = self.send(Method::Post, &url, &body)?;
        Ok(correction.into())
    }

    fn refine(
        &self,
        item_id: ItemId,
        instruction: &str,
        subject: &str,
        body: &str,
    ) -> Result<Refinement> {
        let url = format!("{}/items/{}/refine", self.base_url, item_id);
        let request = RefineRequest {
            instruction,
            subject,
            body,
        };
        let refinement: RefineResponse = self.send(Method::Post, &url, &request)?;
        Ok(refinement.into())
    }

    fn history(&self, variant_id: VariantId, field: Field, step: HistoryStep) -> Result<Variant> {
        let url = format!("{}/variants/{}/{}", self.base_url, variant_id, step.as_str());
        let variant: WireVariant = self.send(Method::Post, &url, &HistoryRequest { field })?;
        Ok(variant.into())
    }

    fn set_draft_selection(&self, item_id: ItemId, index: Option<usize>) -> Result<()> {
        let url = format!("{}/items/{}/draft-selection", self.base_url, item_id);
        debug!("PATCH {}", url);

        ureq::patch(&url)
            .header("Authorization", &self.authorization())
            .send_json(&DraftSelectionRequest {
                selected_variant_index: index,
            })
            .context("Failed to send draft selection request")?;
        Ok(())
    }
}
