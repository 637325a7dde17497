//! URL identifiers derived from event titles.

/// Derive a URL-safe slug from a title.
///
/// Lower-cases the input, collapses every run of characters outside
/// `[a-z0-9]` into a single `-`, and trims hyphens from both ends.
///
/// - `"Cloud & DevOps: 2025!"` -> `"cloud-devops-2025"`
/// - `"  React Summit  "` -> `"react-summit"`
#[must_use]
pub fn derive_slug(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;

    for c in title.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }

    slug
}
