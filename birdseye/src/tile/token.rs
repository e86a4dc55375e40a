//! Parsing of `imageId[-zoom]` input tokens.

use std::io;
use std::path::Path;

use tracing::warn;

use super::error::TileError;
use super::types::ImageKey;
use super::zoom::DEFAULT_ZOOM;

/// Parses one `imageId[-zoom]` token.
///
/// A token without a zoom suffix targets [`DEFAULT_ZOOM`].
///
/// # Examples
///
/// ```
/// use birdseye::tile::parse_image_token;
///
/// let key = parse_image_token("123456").unwrap();
/// assert_eq!((key.image_id(), key.zoom()), (123456, 20));
///
/// let key = parse_image_token("123456-3").unwrap();
/// assert_eq!(key.zoom(), 3);
/// ```
pub fn parse_image_token(token: &str) -> Result<ImageKey, TileError> {
    let token = token.trim();
    let invalid = |reason: &str| TileError::InvalidToken {
        token: token.to_string(),
        reason: reason.to_string(),
    };

    let (id_part, zoom_part) = match token.split_once('-') {
        Some((id, zoom)) => (id, Some(zoom)),
        None => (token, None),
    };

    let image_id: u64 = id_part
        .parse()
        .map_err(|_| invalid("image id is not a positive integer"))?;

    let zoom = match zoom_part {
        Some(z) => z
            .parse::<u8>()
            .map_err(|_| invalid("zoom is not a small positive integer"))?,
        None => DEFAULT_ZOOM,
    };

    ImageKey::new(image_id, zoom)
}

/// Reads tokens one per line from `path`.
///
/// Blank lines are ignored. Tokens that fail to parse are logged and
/// skipped so a single bad line never discards the rest of the list.
pub fn read_image_tokens(path: &Path) -> io::Result<Vec<ImageKey>> {
    let contents = std::fs::read_to_string(path)?;
    let mut keys = Vec::new();

    for (line_no, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match parse_image_token(line) {
            Ok(key) => keys.push(key),
            Err(e) => warn!(
                path = %path.display(),
                line = line_no + 1,
                error = %e,
                "Skipping invalid image token"
            ),
        }
    }

    Ok(keys)
}
