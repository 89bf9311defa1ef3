/// Turns a topic template into a single-level wildcard subscription.
pub fn subscription(template: &str, placeholder: &str) -> String {
    template.replace(placeholder, "+")
}

pub fn render(template: &str, placeholder: &str, value: &str) -> String {
    template.replace(placeholder, value)
}

/// Extracts the value `placeholder` stands for in `topic`, if the topic
/// matches the template. The value must be a single, non-empty topic level.
pub fn extract<'a>(template: &str, placeholder: &str, topic: &'a str) -> Option<&'a str> {
    let (prefix, suffix) = template.split_once(placeholder)?;
    let value = topic.strip_prefix(prefix)?.strip_suffix(suffix)?;

    if value.is_empty() || value.contains('/') {
        None
    } else {
        Some(value)
    }
}
