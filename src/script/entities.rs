use std::sync::LazyLock;

use regex::Regex;

use super::Entity;

/// `{<digits>,<name>}` where the name is non-empty and brace-free.
static ANNOTATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(\d+),([^{}]+)\}").expect("static regex"));

/// Parse an entities cell such as `{1,Seattle} {3,tomorrow}` into entities,
/// in source order.
///
/// Malformed annotations (empty name, non-numeric or overflowing index,
/// nested braces) produce nothing. Text between annotations is ignored.
pub fn parse_entities(cell: &str) -> Vec<Entity> {
    ANNOTATION
        .captures_iter(cell)
        .filter_map(|caps| {
            let index = caps[1].parse::<u32>().ok()?;
            Some(Entity {
                index,
                name: caps[2].to_string(),
            })
        })
        .collect()
}

/// Render an entity back into annotation form.
pub fn render_entity(entity: &Entity) -> String {
    format!("{{{},{}}}", entity.index, entity.name)
}
