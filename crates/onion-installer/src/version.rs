/// Parses `href="X.Y.Z(.W)/"` links out of a directory-listing page and
/// returns the maximum by lexicographic-by-component order.
pub fn latest_version(index_html: &str) -> Option<String> {
    index_html
        .match_indices("href=\"")
        .filter_map(|(start, _)| {
            let rest = &index_html[start + "href=\"".len()..];
            let end = rest.find('"')?;
            let candidate = &rest[..end];
            let trimmed = candidate.strip_suffix('/')?;
            parse_components(trimmed).map(|components| (components, trimmed.to_string()))
        })
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, raw)| raw)
}

fn parse_components(s: &str) -> Option<Vec<u32>> {
    let parts: Vec<&str> = s.split('.').collect();
    if !(3..=4).contains(&parts.len()) {
        return None;
    }
    let mut components = Vec::with_capacity(parts.len());
    for part in parts {
        if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        components.push(part.parse::<u32>().ok()?);
    }
    Some(components)
}
