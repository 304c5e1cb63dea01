/// Text fields a search term is matched against.
pub trait Searchable {
    fn title(&self) -> &str;
    fn description(&self) -> &str;
}

/// Case-insensitive substring match over title and description. A blank
/// term keeps the whole list; order is preserved either way.
pub fn filter_items<T: Searchable + Clone>(items: &[T], term: &str) -> Vec<T> {
    let term = term.trim();
    if term.is_empty() {
        return items.to_vec();
    }

    let needle = term.to_lowercase();
    items
        .iter()
        .filter(|item| {
            item.title().to_lowercase().contains(&needle)
                || item.description().to_lowercase().contains(&needle)
        })
        .cloned()
        .collect()
}
