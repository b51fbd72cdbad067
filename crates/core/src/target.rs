//! Routing target carried in downstream request paths.
//!
//! Both `/start/...` and `/websocket/...` address the same thing: one or
//! more comma-separated channel ids, optionally followed by a client id
//! segment, e.g. `C01,C02/viewer-7`.

use crate::error::CoreError;

/// Channels a downstream client wants, plus its optional client identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub channels: Vec<String>,
    pub client_id: Option<String>,
}

impl Target {
    /// Render back into the `channels[/client_id]` path form.
    pub fn to_path(&self) -> String {
        let mut path = self.channels.join(",");
        if let Some(client_id) = &self.client_id {
            path.push('/');
            path.push_str(client_id);
        }
        path
    }
}

/// Parse the path tail that follows the route prefix.
///
/// Empty channel entries are discarded; a tail with no channel at all is
/// a validation error. An empty client segment means "no client id".
/// Segments after the client id are ignored.
pub fn parse_target(tail: &str) -> Result<Target, CoreError> {
    let mut segments = tail.split('/');

    let channels: Vec<String> = segments
        .next()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect();

    if channels.is_empty() {
        return Err(CoreError::Validation(format!(
            "invalid path: no channel ids in '{tail}'"
        )));
    }

    let client_id = segments
        .next()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string);

    Ok(Target {
        channels,
        client_id,
    })
}
