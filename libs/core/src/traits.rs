use serde_json::{Map, Value};

/// Normalizes the `user` object embedded in a notification.
pub trait TraitGrouping: Send + Sync {
    fn group(&self, user: Value) -> Value;
}

/// Folds flat `traits_*` attributes into nested objects.
///
/// `traits_group/name` lands under `group.name`, an ungrouped `traits_name`
/// under `traits.name`; other keys stay where they are.
///
/// ```
/// use serde_json::json;
/// use shiprelay_core::{GroupTraits, TraitGrouping};
///
/// let grouped = GroupTraits.group(json!({
///     "email": "a@b.c",
///     "traits_score": 4,
///     "traits_clearbit/name": "Acme",
/// }));
/// assert_eq!(grouped, json!({
///     "email": "a@b.c",
///     "traits": { "score": 4 },
///     "clearbit": { "name": "Acme" },
/// }));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupTraits;

impl TraitGrouping for GroupTraits {
    fn group(&self, user: Value) -> Value {
        let Value::Object(flat) = user else {
            return user;
        };
        let mut grouped = Map::new();
        for (key, value) in flat {
            let dest = match key.strip_prefix("traits_") {
                Some(rest) if rest.contains('/') => rest.to_string(),
                Some(rest) => format!("traits/{rest}"),
                None => key,
            };
            let path: Vec<&str> = dest.split('/').collect();
            insert_path(&mut grouped, &path, value);
        }
        Value::Object(grouped)
    }
}

fn insert_path(target: &mut Map<String, Value>, path: &[&str], value: Value) {
    match path {
        [] => {}
        [last] => {
            target.insert((*last).to_string(), value);
        }
        [head, rest @ ..] => {
            let slot = target
                .entry((*head).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(child) = slot {
                insert_path(child, rest, value);
            }
        }
    }
}
