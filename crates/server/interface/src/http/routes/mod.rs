pub mod audit;
pub mod auth;
pub mod catalog;
pub mod orders;
pub mod reports;
pub mod templates;
pub mod users;
pub mod vacancies;

/// Splits a `status=a,b,c` query value into the list form the filters use.
pub(crate) fn split_csv(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

/// Treats blank query values as absent.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim().to_string();
        (!trimmed.is_empty()).then_some(trimmed)
    })
}
