//! Safe on-disk names for job artifacts.

use uuid::Uuid;

/// Longest title we keep before truncating (leaves room for uid + extension
/// under Linux NAME_MAX).
const TITLE_MAX: usize = 180;

/// Sanitizes a display title into a filename-safe stem.
///
/// Keeps alphanumerics plus ` ._-`, replaces everything else with `_`,
/// trims surrounding spaces/dots/underscores, and falls back to "download"
/// when nothing survives.
pub fn sanitize_title(title: &str) -> String {
    let cleaned: String = title
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, ' ' | '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = cleaned.trim_matches(|c| c == ' ' || c == '.' || c == '_');
    if trimmed.is_empty() {
        return "download".to_string();
    }

    if trimmed.len() > TITLE_MAX {
        let mut take = TITLE_MAX;
        while take > 0 && !trimmed.is_char_boundary(take) {
            take -= 1;
        }
        trimmed[..take].to_string()
    } else {
        trimmed.to_string()
    }
}

/// Short unique suffix so concurrent jobs for the same title never collide.
pub fn short_uid() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    hex[..8].to_string()
}
