//! Search query construction for a lead.

/// Placeholder replaced with the lead's name.
pub const NAME_PLACEHOLDER: &str = "{name}";

/// Placeholder replaced with the lead's email.
pub const EMAIL_PLACEHOLDER: &str = "{email}";

/// Queries to try for a lead, in priority order.
///
/// With a template: exactly one query, placeholders substituted literally
/// (no escaping; an empty value substitutes as an empty string; unknown
/// placeholders are left as-is). Without: the email query, then the name
/// query, each skipped when its value is empty.
///
/// Callers must not search for a lead with neither name nor email.
pub fn build_queries(name: &str, email: &str, template: Option<&str>) -> Vec<String> {
    let name = name.trim();
    let email = email.trim();

    if let Some(template) = template {
        return vec![
            template
                .replace(NAME_PLACEHOLDER, name)
                .replace(EMAIL_PLACEHOLDER, email),
        ];
    }

    [email, name]
        .into_iter()
        .filter(|value| !value.is_empty())
        .map(|value| format!("\"{value}\" instagram"))
        .collect()
}

/// Upper bound on queries per lead, for estimates.
pub fn queries_per_lead(template: Option<&str>) -> usize {
    if template.is_some() { 1 } else { 2 }
}
