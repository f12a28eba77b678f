//! Typed DVR and auto-record mutations with the soft-failure policy.
//!
//! HTSP acknowledges mutating requests with `success:1` or `success:0` plus
//! an optional `error` string. These operations are idempotent-ish (cancel,
//! delete, schedule), so a refusal is logged at error level and reported as
//! `Ok(false)` rather than an `Err`; only transport and protocol problems
//! surface as errors.

use log::error;

use crate::{connection::HtspConnection, error::HtspError, message::Message};

impl HtspConnection {
    /// Schedule a recording for a guide event.
    ///
    /// # Errors
    ///
    /// Returns [`HtspError`] on transport failure; a server refusal is
    /// `Ok(false)`.
    pub async fn add_dvr_entry(&self, event_id: i64) -> Result<bool, HtspError> {
        self.mutate(Message::request("addDvrEntry").with("eventId", event_id))
            .await
    }

    /// Cancel an in-progress or scheduled recording.
    ///
    /// # Errors
    ///
    /// Returns [`HtspError`] on transport failure; a server refusal is
    /// `Ok(false)`.
    pub async fn cancel_dvr_entry(&self, entry_id: i64) -> Result<bool, HtspError> {
        self.mutate(Message::request("cancelDvrEntry").with("id", entry_id))
            .await
    }

    /// Delete a recording entry and any recorded file.
    ///
    /// # Errors
    ///
    /// Returns [`HtspError`] on transport failure; a server refusal is
    /// `Ok(false)`.
    pub async fn delete_dvr_entry(&self, entry_id: i64) -> Result<bool, HtspError> {
        self.mutate(Message::request("deleteDvrEntry").with("id", entry_id))
            .await
    }

    /// Create an auto-record rule matching `title` on `channel_id`.
    ///
    /// # Errors
    ///
    /// Returns [`HtspError`] on transport failure; a server refusal is
    /// `Ok(false)`.
    pub async fn add_autorec_entry(&self, title: &str, channel_id: i64) -> Result<bool, HtspError> {
        self.mutate(
            Message::request("addAutorecEntry")
                .with("title", title)
                .with("channelId", channel_id),
        )
        .await
    }

    /// Delete an auto-record rule.
    ///
    /// # Errors
    ///
    /// Returns [`HtspError`] on transport failure; a server refusal is
    /// `Ok(false)`.
    pub async fn delete_autorec_entry(&self, autorec_id: &str) -> Result<bool, HtspError> {
        self.mutate(Message::request("deleteAutorecEntry").with("id", autorec_id))
            .await
    }

    async fn mutate(&self, request: Message) -> Result<bool, HtspError> {
        let method = request.method().unwrap_or("<none>").to_owned();
        let response = self.request(request).await?;
        let granted = response.get_int("success").unwrap_or(1) != 0;
        if !granted {
            error!(
                "{method} refused by server: {}",
                response.get_str("error").unwrap_or("no reason given"),
            );
        }
        Ok(granted)
    }
}
