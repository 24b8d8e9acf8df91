const FALLBACK: &str = "application/octet-stream";

/// Content type for a filename, by extension.
pub fn content_type_for(filename: &str) -> &'static str {
    mime_guess::from_path(filename)
        .first_raw()
        .unwrap_or(FALLBACK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions() {
        assert_eq!(content_type_for("photo.png"), "image/png");
        assert_eq!(content_type_for("holiday.JPG"), "image/jpeg");
        assert_eq!(content_type_for("clip.mp4"), "video/mp4");
    }

    #[test]
    fn unknown_extensions_fall_back() {
        assert_eq!(content_type_for("README"), FALLBACK);
        assert_eq!(content_type_for("data.zzzunknown"), FALLBACK);
    }
}
