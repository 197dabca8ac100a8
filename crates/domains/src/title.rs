/// Derives the chapter join key from a work title: lowercase, with every
/// run of whitespace collapsed into a single `-`. Leading and trailing runs
/// are kept, so `" A "` becomes `"-a-"`.
pub fn normalize_title(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut in_whitespace = false;

    for ch in title.chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                slug.push('-');
            }
            in_whitespace = true;
        } else {
            in_whitespace = false;
            slug.extend(ch.to_lowercase());
        }
    }

    slug
}
