//! Typed event-listing query (`getEvents`) with window filtering and genre
//! classification.
//!
//! The original consumer asks for a guide window per channel; the server
//! returns every known event, so the client filters to events overlapping
//! the window and classifies the DVB content-type nibble into a coarse
//! category plus boolean flags.

use log::debug;

use crate::{
    connection::HtspConnection,
    error::HtspError,
    message::{Message, Value},
};

/// Half-open-ish query window in UTC Unix seconds.
///
/// An event is kept when it overlaps the window: `stop >= start_of_window`
/// and `start <= end_of_window`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventWindow {
    /// Window start, Unix seconds.
    pub start: i64,
    /// Window end, Unix seconds.
    pub end: i64,
}

impl EventWindow {
    /// Returns `true` if an event spanning `[start, stop]` overlaps this
    /// window.
    #[must_use]
    pub fn overlaps(&self, start: i64, stop: i64) -> bool {
        stop >= self.start && start <= self.end
    }
}

/// Coarse program category derived from the DVB content-type high nibble.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProgramCategory {
    /// Movie / drama (nibble `0x1`).
    Movie,
    /// News / current affairs (nibble `0x2`).
    News,
    /// Sports (nibble `0x4`).
    Sports,
    /// Children's / youth (nibble `0x5`).
    Kids,
    /// Anything else, including events without a content type.
    #[default]
    Other,
}

impl ProgramCategory {
    /// Classify a DVB content-type byte.
    #[must_use]
    pub fn from_content_type(content_type: i64) -> Self {
        match (content_type >> 4) & 0xF {
            0x1 => Self::Movie,
            0x2 => Self::News,
            0x4 => Self::Sports,
            0x5 => Self::Kids,
            _ => Self::Other,
        }
    }
}

/// One guide entry from a `getEvents` response, window-filtered and
/// classified.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgramEvent {
    /// Server-assigned event identifier.
    pub event_id: Option<i64>,
    /// Channel the event airs on.
    pub channel_id: i64,
    /// Start time, Unix seconds.
    pub start: i64,
    /// Stop time, Unix seconds.
    pub stop: i64,
    /// Title, if the server supplied one.
    pub title: Option<String>,
    /// Long description.
    pub description: Option<String>,
    /// Short summary.
    pub summary: Option<String>,
    /// First-aired time, Unix seconds.
    pub first_aired: Option<i64>,
    /// Star rating as reported by the server.
    pub star_rating: Option<i64>,
    /// Artwork URL.
    pub image: Option<String>,
    /// Raw DVB content-type byte.
    pub content_type: Option<i64>,
    /// Category derived from `content_type`.
    pub category: ProgramCategory,
    /// Classified as a movie.
    pub is_movie: bool,
    /// Classified as news.
    pub is_news: bool,
    /// Classified as sports.
    pub is_sports: bool,
    /// Classified as a children's programme.
    pub is_kids: bool,
    /// Treated as live programming (news and sports genres).
    pub is_live: bool,
}

impl ProgramEvent {
    /// Build an event from one entry of the `events` list.
    ///
    /// Returns `None` when `start` or `stop` is missing; such entries are
    /// skipped rather than failing the whole listing. An entry without
    /// `channelId` inherits `query_channel_id`.
    #[must_use]
    pub fn from_message(entry: &Message, query_channel_id: i64) -> Option<Self> {
        let start = entry.get_int("start")?;
        let stop = entry.get_int("stop")?;
        let content_type = entry.get_int("contentType");
        let category = content_type.map(ProgramCategory::from_content_type).unwrap_or_default();

        let is_news = category == ProgramCategory::News;
        let is_sports = category == ProgramCategory::Sports;
        Some(Self {
            event_id: entry.get_int("eventId"),
            channel_id: entry.get_int("channelId").unwrap_or(query_channel_id),
            start,
            stop,
            title: entry.get_str("title").map(str::to_owned),
            description: entry.get_str("description").map(str::to_owned),
            summary: entry.get_str("summary").map(str::to_owned),
            first_aired: entry.get_int("firstAired"),
            star_rating: entry.get_int("starRating"),
            image: entry.get_str("image").map(str::to_owned),
            content_type,
            category,
            is_movie: category == ProgramCategory::Movie,
            is_news,
            is_sports,
            is_kids: category == ProgramCategory::Kids,
            is_live: is_news || is_sports,
        })
    }
}

/// Transform a `getEvents` response into window-filtered [`ProgramEvent`]s.
///
/// Entries missing `start` or `stop` are skipped; entries entirely outside
/// `window` are dropped; list order is preserved for survivors.
#[must_use]
pub fn events_in_window(
    response: &Message,
    query_channel_id: i64,
    window: EventWindow,
) -> Vec<ProgramEvent> {
    let Some(entries) = response.get_list("events") else {
        debug!("getEvents response carried no events list");
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(Value::as_map)
        .filter_map(|entry| ProgramEvent::from_message(entry, query_channel_id))
        .filter(|event| window.overlaps(event.start, event.stop))
        .collect()
}

impl HtspConnection {
    /// Fetch the guide for `channel_id`, filtered to events overlapping
    /// `window`.
    ///
    /// # Errors
    ///
    /// Returns [`HtspError`] if the connection is not open or stops before
    /// the response arrives.
    pub async fn get_events(
        &self,
        channel_id: i64,
        window: EventWindow,
    ) -> Result<Vec<ProgramEvent>, HtspError> {
        let response = self
            .request(Message::request("getEvents").with("channelId", channel_id))
            .await?;
        Ok(events_in_window(&response, channel_id, window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_nibble_selects_category() {
        assert_eq!(ProgramCategory::from_content_type(0x15), ProgramCategory::Movie);
        assert_eq!(ProgramCategory::from_content_type(0x20), ProgramCategory::News);
        assert_eq!(ProgramCategory::from_content_type(0x43), ProgramCategory::Sports);
        assert_eq!(ProgramCategory::from_content_type(0x50), ProgramCategory::Kids);
        assert_eq!(ProgramCategory::from_content_type(0x70), ProgramCategory::Other);
    }

    #[test]
    fn event_without_channel_inherits_queried_channel() {
        let entry = Message::new().with("start", 100_i64).with("stop", 200_i64);
        let event = ProgramEvent::from_message(&entry, 42).expect("start/stop present");
        assert_eq!(event.channel_id, 42);
        assert_eq!(event.category, ProgramCategory::Other);
        assert!(!event.is_live);
    }

    #[test]
    fn sports_events_are_flagged_live() {
        let entry = Message::new()
            .with("start", 100_i64)
            .with("stop", 200_i64)
            .with("contentType", 0x40_i64);
        let event = ProgramEvent::from_message(&entry, 1).expect("valid entry");
        assert!(event.is_sports);
        assert!(event.is_live);
        assert!(!event.is_movie);
    }
}
