use serde_json::Value;

/// A response shape matcher: `None` when the shape does not apply
type ShapeMatcher = fn(&Value) -> Option<Vec<String>>;

/// Known `/api/tags` response shapes, tried in priority order
const TAG_SHAPES: &[(&str, ShapeMatcher)] = &[
    ("models array", models_array),
    ("models mapping", models_mapping),
    ("tags array", tags_array),
    ("root array", root_array),
];

/// Decode the model names out of a tag-listing response.
///
/// Returns the label of the matching shape alongside the names, or `None`
/// when no known shape matches.
pub fn decode_tags(body: &Value) -> Option<(&'static str, Vec<String>)> {
    TAG_SHAPES
        .iter()
        .find_map(|(label, matcher)| matcher(body).map(|names| (*label, names)))
}

fn models_array(body: &Value) -> Option<Vec<String>> {
    body.get("models")?.as_array().map(|items| entry_names(items))
}

fn models_mapping(body: &Value) -> Option<Vec<String>> {
    body.get("models")?
        .as_object()
        .map(|map| map.keys().cloned().collect())
}

fn tags_array(body: &Value) -> Option<Vec<String>> {
    body.get("tags")?.as_array().map(|items| entry_names(items))
}

fn root_array(body: &Value) -> Option<Vec<String>> {
    body.as_array().map(|items| entry_names(items))
}

/// Entries are either bare strings or objects carrying a `name` (or `model`)
fn entry_names(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(name) => Some(name.as_str()),
            Value::Object(obj) => obj
                .get("name")
                .or_else(|| obj.get("model"))
                .and_then(Value::as_str),
            _ => None,
        })
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse the tabular output of `ollama list`.
///
/// The first whitespace-delimited token of each non-blank line is the model
/// name; the first line is skipped when it is a `NAME` header.
pub fn parse_list_output(stdout: &str) -> Vec<String> {
    let mut lines = stdout.lines().filter(|line| !line.trim().is_empty()).peekable();

    if lines
        .peek()
        .is_some_and(|first| first.split_whitespace().any(|token| token == "NAME"))
    {
        lines.next();
    }

    lines
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect()
}
