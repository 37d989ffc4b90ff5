//! Storage locations for pipeline artifacts.
//!
//! Every artifact name carries a random UUID, so repeated runs over the
//! same photo never overwrite each other.

use uuid::Uuid;

/// Final path segment of `location` without its extension.
///
/// Both `/` and `\` count as separators.
#[must_use]
pub fn file_stem(location: &str) -> &str {
    let name = location.rsplit(['/', '\\']).next().unwrap_or(location);
    match name.rfind('.') {
        Some(dot) if dot > 0 => &name[..dot],
        _ => name,
    }
}

/// Location for an artifact derived from `source` on behalf of `user`:
/// `{prefix}/{user}/{stem}_{uuid}`.
#[must_use]
pub fn artifact_location(prefix: &str, user: &str, source: &str) -> String {
    format!(
        "{}/{user}/{}_{}",
        prefix.trim_end_matches('/'),
        file_stem(source),
        Uuid::new_v4()
    )
}

/// Location for the digit tile at `(row, col)` cut from `artifact`:
/// `{prefix}/{stem}/{rc}_{uuid}`, where `rc` is the row and column as two
/// digits.
#[must_use]
pub fn tile_location(prefix: &str, artifact: &str, row: usize, col: usize) -> String {
    format!(
        "{}/{}/{row}{col}_{}",
        prefix.trim_end_matches('/'),
        file_stem(artifact),
        Uuid::new_v4()
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn split_uuid(location: &str) -> (&str, Uuid) {
        let (head, id) = location.rsplit_once('_').unwrap();
        (head, Uuid::parse_str(id).unwrap())
    }

    #[test]
    fn stems() {
        assert_eq!(file_stem("photos/42/IMG_001.jpg"), "IMG_001");
        assert_eq!(file_stem("photos\\42\\scan.v2.png"), "scan.v2");
        assert_eq!(file_stem("plain"), "plain");
        assert_eq!(file_stem(".hidden"), ".hidden");
    }

    #[test]
    fn artifact_names_are_unique() {
        let a = artifact_location("warped/", "42", "uploads/photo.jpg");
        let b = artifact_location("warped", "42", "uploads/photo.jpg");
        let (head_a, id_a) = split_uuid(&a);
        let (head_b, id_b) = split_uuid(&b);
        assert_eq!(head_a, "warped/42/photo");
        assert_eq!(head_a, head_b);
        assert_ne!(id_a, id_b);
    }

    #[test]
    fn tile_names_encode_position() {
        let artifact = artifact_location("warped", "7", "img.png");
        let tile = tile_location("digits", &artifact, 3, 8);
        let (head, _) = split_uuid(&tile);
        let stem = file_stem(&artifact);
        assert_eq!(head, format!("digits/{stem}/38"));
    }
}
