//! [`EditorCapability`] backed by an in-memory JSON tree.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use postbridge_envelope::{PropertyValue, RemoteValue};
use serde_json::Value;
use tracing::debug;

use crate::capability::{
    Argument, CapabilityError, CapabilityResult, EditorCapability, EventCallback,
    ADD_EVENT_LISTENER, DOCUMENT_PATH,
};

/// Fires every callback subscribed to the event named by the first argument.
pub const FIRE_EVENT: &str = "FireEvent";
/// Returns the keys of an object node.
pub const KEYS: &str = "Keys";
/// Returns the element count of an array or object, or a string's length.
pub const LENGTH: &str = "Length";

/// A document backed by a `serde_json::Value`.
///
/// Paths are dot separated (`page.1.element.2`). A leading `document`
/// segment is optional and names the root. Numeric segments index arrays;
/// on objects every segment is a key.
///
/// Subscriptions keep one callback per event name. Subscribing again to the
/// same name replaces the previous callback.
#[derive(Default)]
pub struct JsonDocument {
    root: Mutex<Value>,
    subscriptions: Mutex<HashMap<String, EventCallback>>,
}

impl JsonDocument {
    pub fn new(root: Value) -> Self {
        Self {
            root: Mutex::new(root),
            subscriptions: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        Ok(Self::new(serde_json::from_str(text)?))
    }

    /// Copy of the current tree.
    pub fn snapshot(&self) -> Value {
        lock(&self.root).clone()
    }

    /// Invoke the callback subscribed to `event_name`, if any.
    pub fn fire(&self, event_name: &str) -> bool {
        let callback = lock(&self.subscriptions).get(event_name).cloned();
        match callback {
            Some(callback) => {
                debug!(event = %event_name, "firing document event");
                callback();
                true
            }
            None => false,
        }
    }

    /// Event names with a subscription, sorted.
    pub fn subscribed_events(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.subscriptions).keys().cloned().collect();
        names.sort_unstable();
        names
    }

    fn subscribe(&self, args: Vec<Argument>) -> CapabilityResult {
        let mut args = args.into_iter();
        let (Some(Argument::Text(name)), Some(Argument::Callback(callback))) =
            (args.next(), args.next())
        else {
            return Err(CapabilityError::InvalidArgument(format!(
                "{ADD_EVENT_LISTENER} expects an event name and a callback"
            )));
        };
        debug!(event = %name, "document subscription registered");
        lock(&self.subscriptions).insert(name, callback);
        Ok(RemoteValue::Null)
    }

    fn fire_from_args(&self, args: &[Argument]) -> CapabilityResult {
        let name = args.first().and_then(Argument::as_text).ok_or_else(|| {
            CapabilityError::InvalidArgument(format!("{FIRE_EVENT} expects an event name"))
        })?;
        Ok(PropertyValue::Bool(self.fire(name)).into())
    }
}

impl EditorCapability for JsonDocument {
    fn get_object(&self, path: &str) -> CapabilityResult {
        let root = lock(&self.root);
        let node = resolve(&root, path)?;
        Ok(RemoteValue::from_json(node.clone()))
    }

    fn set_property(&self, path: &str, property: &str, value: &PropertyValue) -> CapabilityResult {
        let mut root = lock(&self.root);
        let node = resolve_mut(&mut root, path)?;
        match node {
            Value::Object(map) => {
                map.insert(property.to_string(), value.to_json());
            }
            Value::Array(items) => {
                let slot = property
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| items.get_mut(index))
                    .ok_or_else(|| {
                        CapabilityError::InvalidArgument(format!(
                            "{property:?} is not an index of {path:?}"
                        ))
                    })?;
                *slot = value.to_json();
            }
            _ => {
                return Err(CapabilityError::InvalidArgument(format!(
                    "{path:?} has no properties"
                )))
            }
        }
        Ok(value.clone().into())
    }

    fn execute_function(
        &self,
        path: &str,
        function: &str,
        args: Vec<Argument>,
    ) -> CapabilityResult {
        let on_document = segments(path).next().is_none();
        match function {
            ADD_EVENT_LISTENER if on_document => self.subscribe(args),
            FIRE_EVENT if on_document => self.fire_from_args(&args),
            KEYS => {
                let root = lock(&self.root);
                match resolve(&root, path)? {
                    Value::Object(map) => Ok(RemoteValue::from_json(Value::Array(
                        map.keys().cloned().map(Value::String).collect(),
                    ))),
                    _ => Err(CapabilityError::InvalidArgument(format!(
                        "{path:?} is not an object"
                    ))),
                }
            }
            LENGTH => {
                let root = lock(&self.root);
                let length = match resolve(&root, path)? {
                    Value::Array(items) => items.len(),
                    Value::Object(map) => map.len(),
                    Value::String(text) => text.chars().count(),
                    _ => {
                        return Err(CapabilityError::InvalidArgument(format!(
                            "{path:?} has no length"
                        )))
                    }
                };
                let length = i64::try_from(length)
                    .map_err(|_| CapabilityError::Failed("length overflow".to_string()))?;
                Ok(PropertyValue::from(length).into())
            }
            _ => Err(CapabilityError::UnknownFunction {
                path: path.to_string(),
                function: function.to_string(),
            }),
        }
    }
}

impl std::fmt::Debug for JsonDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonDocument")
            .field("root", &*lock(&self.root))
            .field("subscriptions", &self.subscribed_events())
            .finish()
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    let mut parts = path.split('.').filter(|part| !part.is_empty()).peekable();
    if parts.peek() == Some(&DOCUMENT_PATH) {
        parts.next();
    }
    parts
}

fn resolve<'a>(root: &'a Value, path: &str) -> Result<&'a Value, CapabilityError> {
    let mut node = root;
    for segment in segments(path) {
        node = match node {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
        .ok_or_else(|| CapabilityError::NotFound(path.to_string()))?;
    }
    Ok(node)
}

fn resolve_mut<'a>(root: &'a mut Value, path: &str) -> Result<&'a mut Value, CapabilityError> {
    let mut node = root;
    for segment in segments(path) {
        node = match node {
            Value::Object(map) => map.get_mut(segment),
            Value::Array(items) => segment
                .parse::<usize>()
                .ok()
                .and_then(move |i| items.get_mut(i)),
            _ => None,
        }
        .ok_or_else(|| CapabilityError::NotFound(path.to_string()))?;
    }
    Ok(node)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use serde_json::json;

    use super::*;

    fn sample() -> JsonDocument {
        JsonDocument::new(json!({
            "title": "Quarterly",
            "page": [
                {"element": [{"x": 1, "y": 2}, {"x": 10, "y": 20}]},
                {"element": []}
            ]
        }))
    }

    #[test]
    fn resolves_nested_paths() {
        let document = sample();
        assert_eq!(
            document.get_object("page.0.element.1").unwrap().to_json(),
            json!({"x": 10, "y": 20})
        );
        assert_eq!(
            document.get_object("document.title").unwrap(),
            RemoteValue::Primitive("Quarterly".into())
        );
        assert_eq!(document.get_object("document").unwrap().to_json(), document.snapshot());
    }

    #[test]
    fn missing_path_is_not_found() {
        let document = sample();
        for path in ["page.7", "title.0", "page.x", "nope"] {
            assert_eq!(
                document.get_object(path),
                Err(CapabilityError::NotFound(path.to_string()))
            );
        }
    }

    #[test]
    fn set_property_updates_tree() {
        let document = sample();
        let result = document
            .set_property("page.0.element.1", "x", &PropertyValue::from(42i64))
            .unwrap();
        assert_eq!(result, RemoteValue::Primitive(PropertyValue::from(42i64)));
        assert_eq!(document.snapshot()["page"][0]["element"][1]["x"], json!(42));

        document
            .set_property("page.0.element", "0", &PropertyValue::from("replaced"))
            .unwrap();
        assert_eq!(document.snapshot()["page"][0]["element"][0], json!("replaced"));

        assert!(matches!(
            document.set_property("title", "x", &PropertyValue::from(true)),
            Err(CapabilityError::InvalidArgument(_))
        ));
    }

    #[test]
    fn keys_and_length() {
        let document = sample();
        assert_eq!(
            document
                .execute_function("page.0.element.0", KEYS, Vec::new())
                .unwrap()
                .to_json(),
            json!(["x", "y"])
        );
        assert_eq!(
            document.execute_function("page", LENGTH, Vec::new()).unwrap(),
            RemoteValue::Primitive(PropertyValue::from(2i64))
        );
        assert_eq!(
            document.execute_function("title", LENGTH, Vec::new()).unwrap(),
            RemoteValue::Primitive(PropertyValue::from(9i64))
        );
    }

    #[test]
    fn unknown_function_is_reported() {
        let document = sample();
        assert_eq!(
            document.execute_function("page", "Explode", vec!["1".into()]),
            Err(CapabilityError::UnknownFunction {
                path: "page".to_string(),
                function: "Explode".to_string(),
            })
        );
        // Event functions only exist on the document itself.
        assert!(matches!(
            document.execute_function("page", ADD_EVENT_LISTENER, Vec::new()),
            Err(CapabilityError::UnknownFunction { .. })
        ));
    }

    #[test]
    fn subscription_is_latest_wins() {
        let document = sample();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        for counter in [&first, &second] {
            let counter = Arc::clone(counter);
            let callback: EventCallback = Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
            document
                .execute_function(
                    DOCUMENT_PATH,
                    ADD_EVENT_LISTENER,
                    vec!["click".into(), Argument::Callback(callback)],
                )
                .unwrap();
        }

        assert_eq!(
            document
                .execute_function(DOCUMENT_PATH, FIRE_EVENT, vec!["click".into()])
                .unwrap(),
            RemoteValue::Primitive(PropertyValue::Bool(true))
        );
        assert!(!document.fire("hover"));
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(document.subscribed_events(), vec!["click".to_string()]);
    }

    #[test]
    fn add_event_listener_requires_callback() {
        let document = sample();
        assert!(matches!(
            document.execute_function(DOCUMENT_PATH, ADD_EVENT_LISTENER, vec!["click".into()]),
            Err(CapabilityError::InvalidArgument(_))
        ));
    }

    #[test]
    fn parses_from_text() {
        let document = JsonDocument::from_json_str(r#"{"a": {"b": true}}"#).unwrap();
        assert_eq!(
            document.get_object("a.b").unwrap(),
            RemoteValue::Primitive(PropertyValue::Bool(true))
        );
        assert!(JsonDocument::from_json_str("{").is_err());
    }
}
