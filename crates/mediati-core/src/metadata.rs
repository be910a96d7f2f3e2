//! Decorator metadata reader.
//!
//! Turns the declarations attached to a handler into the ordered list the
//! pipeline builder consumes. Configuration can move a decorator (`order`) or
//! replace its payload (`config`) without recompiling:
//!
//! ```toml
//! [handlers.CreateUserHandler.decorators.WrapError]
//! order = 5
//! config = { rethrow = true }
//! ```
//!
//! A handler key is either the handler's full path (`app::users::Handler`)
//! or its bare type name when that name is unique. [`DecoratorOverrides::bind`]
//! rewrites every key to a path before any chain is built.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::decorator::DecoratorDeclaration;
use crate::error::RegistrationError;
use crate::message::Message;

/// Override for one decorator on one handler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DecoratorOverride {
    /// Replacement ordering key.
    #[serde(default)]
    pub order: Option<i64>,
    /// Replacement payload, decoded against the template's `Config`.
    #[serde(default)]
    pub config: Option<serde_json::Value>,
}

/// Overrides for all decorators of one handler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HandlerOverrides {
    /// Keyed by template name.
    #[serde(default)]
    pub decorators: HashMap<String, DecoratorOverride>,
}

/// Decorator overrides keyed by handler name, then template name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecoratorOverrides {
    handlers: HashMap<String, HandlerOverrides>,
}

impl DecoratorOverrides {
    /// Creates an empty override table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the override for `template` on `handler`.
    pub fn set(
        &mut self,
        handler: impl Into<String>,
        template: impl Into<String>,
        value: DecoratorOverride,
    ) -> &mut Self {
        self.handlers
            .entry(handler.into())
            .or_default()
            .decorators
            .insert(template.into(), value);
        self
    }

    /// Returns the override for `template` on `handler`.
    pub fn get(&self, handler: &str, template: &str) -> Option<&DecoratorOverride> {
        self.handlers.get(handler)?.decorators.get(template)
    }

    /// Returns the overrides of one handler.
    pub fn handler(&self, handler: &str) -> Option<&HandlerOverrides> {
        self.handlers.get(handler)
    }

    /// Iterates over `(handler, overrides)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &HandlerOverrides)> {
        self.handlers.iter().map(|(name, o)| (name.as_str(), o))
    }

    /// Returns `true` if there are no overrides.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Re-keys the overrides by handler path.
    ///
    /// `handlers` lists the `(name, path)` of every discovered handler. A key
    /// equal to a path targets that handler; otherwise it must equal exactly
    /// one bare name. Keys matching nothing, or several handlers, are
    /// returned as errors and left out of the result. When a bare name and a
    /// path both target one handler, the path entry wins per template.
    pub fn bind(&self, handlers: &[(&'static str, &'static str)]) -> (Self, Vec<RegistrationError>) {
        let mut targeted: Vec<(bool, &str, &HandlerOverrides, Vec<&'static str>)> = self
            .handlers
            .iter()
            .map(|(key, overrides)| {
                let by_path: Vec<_> = handlers
                    .iter()
                    .filter(|(_, path)| *path == key.as_str())
                    .map(|(_, path)| *path)
                    .collect();
                if by_path.is_empty() {
                    let by_name = handlers
                        .iter()
                        .filter(|(name, _)| *name == key.as_str())
                        .map(|(_, path)| *path)
                        .collect();
                    (false, key.as_str(), overrides, by_name)
                } else {
                    (true, key.as_str(), overrides, by_path)
                }
            })
            .collect();
        targeted.sort_by_key(|(exact, key, ..)| (*exact, *key));

        let mut bound = Self::new();
        let mut errors = Vec::new();
        for (_, key, overrides, targets) in targeted {
            match targets.len() {
                0 => errors.push(RegistrationError::UnknownOverride { key: key.to_owned() }),
                1 => bound
                    .handlers
                    .entry(targets[0].to_owned())
                    .or_default()
                    .decorators
                    .extend(overrides.decorators.clone()),
                _ => errors.push(RegistrationError::AmbiguousOverride {
                    key: key.to_owned(),
                    handlers: targets,
                }),
            }
        }
        (bound, errors)
    }
}

/// Returns the declarations of `handler` in chain order, outermost first.
///
/// Overrides are applied before sorting. The sort is stable, so declarations
/// with equal keys keep their declaration order.
pub fn read_decorators<M: Message>(
    handler: &str,
    declared: &[DecoratorDeclaration<M>],
    overrides: &DecoratorOverrides,
) -> Vec<DecoratorDeclaration<M>> {
    let mut decorators = declared.to_vec();

    if let Some(handler_overrides) = overrides.handler(handler) {
        for (template, value) in &handler_overrides.decorators {
            let mut matched = false;
            for decl in decorators
                .iter_mut()
                .filter(|d| d.template().name() == template)
            {
                matched = true;
                if let Some(order) = value.order {
                    decl.set_order(order);
                }
                if let Some(config) = &value.config {
                    decl.set_raw_config(config.clone());
                }
            }
            if !matched {
                warn!(
                    handler,
                    template = template.as_str(),
                    "override names a decorator the handler does not declare"
                );
            }
        }
    }

    decorators.sort_by_key(DecoratorDeclaration::order);

    debug!(
        handler,
        decorators = ?decorators.iter().map(|d| d.template().name()).collect::<Vec<_>>(),
        "Read decorator metadata"
    );

    decorators
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Ping, Tag};

    fn names(decls: &[DecoratorDeclaration<Ping>]) -> Vec<&'static str> {
        decls.iter().map(|d| d.template().name()).collect()
    }

    #[test]
    fn sorts_by_order_key() {
        let declared = vec![
            DecoratorDeclaration::<Ping>::new::<Tag<30>>(30, ()),
            DecoratorDeclaration::new::<Tag<10>>(10, ()),
            DecoratorDeclaration::new::<Tag<20>>(20, ()),
        ];
        let sorted = read_decorators("PingHandler", &declared, &DecoratorOverrides::new());
        assert_eq!(names(&sorted), ["Tag10", "Tag20", "Tag30"]);
    }

    #[test]
    fn ties_keep_declaration_order() {
        let declared = vec![
            DecoratorDeclaration::<Ping>::new::<Tag<2>>(0, ()),
            DecoratorDeclaration::new::<Tag<1>>(0, ()),
            DecoratorDeclaration::new::<Tag<3>>(-1, ()),
        ];
        let sorted = read_decorators("PingHandler", &declared, &DecoratorOverrides::new());
        assert_eq!(names(&sorted), ["Tag3", "Tag2", "Tag1"]);
    }

    #[test]
    fn overrides_move_and_reconfigure() {
        let declared = vec![
            DecoratorDeclaration::<Ping>::new::<Tag<1>>(1, ()),
            DecoratorDeclaration::new::<Tag<2>>(2, ()),
        ];
        let mut overrides = DecoratorOverrides::new();
        overrides.set(
            "PingHandler",
            "Tag1",
            DecoratorOverride {
                order: Some(99),
                config: Some(serde_json::Value::Null),
            },
        );
        overrides.set(
            "OtherHandler",
            "Tag2",
            DecoratorOverride {
                order: Some(-5),
                config: None,
            },
        );

        let sorted = read_decorators("PingHandler", &declared, &overrides);
        assert_eq!(names(&sorted), ["Tag2", "Tag1"]);
        assert_eq!(sorted[1].order(), 99);
        assert!(matches!(sorted[1].payload(), crate::decorator::Payload::Raw(_)));
    }

    #[test]
    fn no_declarations_yield_empty_list() {
        let sorted = read_decorators::<Ping>("PingHandler", &[], &DecoratorOverrides::new());
        assert!(sorted.is_empty());
    }

    #[test]
    fn overrides_deserialize_from_nested_tables() {
        let overrides: DecoratorOverrides = serde_json::from_value(serde_json::json!({
            "PingHandler": { "decorators": { "Tag1": { "order": 7 } } }
        }))
        .unwrap();
        assert_eq!(overrides.get("PingHandler", "Tag1").unwrap().order, Some(7));
        assert!(overrides.get("PingHandler", "Tag2").is_none());
    }

    #[test]
    fn misspelled_handler_section_is_rejected() {
        let result = serde_json::from_value::<DecoratorOverrides>(serde_json::json!({
            "PingHandler": { "decorator": { "Tag1": { "order": 7 } } }
        }));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("decorator"), "{err}");
    }

    const HANDLERS: &[(&str, &str)] = &[
        ("Handler", "app::charge::Handler"),
        ("Handler", "app::refund::Handler"),
        ("PingHandler", "app::PingHandler"),
    ];

    fn rethrow() -> DecoratorOverride {
        DecoratorOverride {
            order: None,
            config: Some(serde_json::json!({ "rethrow": true })),
        }
    }

    #[test]
    fn bind_keys_overrides_by_path() {
        let mut overrides = DecoratorOverrides::new();
        overrides.set("app::charge::Handler", "WrapError", rethrow());
        overrides.set("PingHandler", "Tag1", DecoratorOverride::default());

        let (bound, errors) = overrides.bind(HANDLERS);
        assert!(errors.is_empty(), "{errors:?}");
        assert!(bound.get("app::charge::Handler", "WrapError").is_some());
        assert!(bound.handler("app::refund::Handler").is_none());
        assert!(bound.get("app::PingHandler", "Tag1").is_some());
        assert!(bound.handler("PingHandler").is_none());
    }

    #[test]
    fn bind_rejects_shared_bare_names() {
        let mut overrides = DecoratorOverrides::new();
        overrides.set("Handler", "WrapError", rethrow());

        let (bound, errors) = overrides.bind(HANDLERS);
        assert!(bound.is_empty());
        match &errors[..] {
            [RegistrationError::AmbiguousOverride { key, handlers }] => {
                assert_eq!(key, "Handler");
                assert_eq!(handlers, &["app::charge::Handler", "app::refund::Handler"]);
            }
            other => panic!("unexpected errors: {other:?}"),
        }
    }

    #[test]
    fn bind_reports_unknown_handlers() {
        let mut overrides = DecoratorOverrides::new();
        overrides.set("Handlr", "WrapError", rethrow());

        let (bound, errors) = overrides.bind(HANDLERS);
        assert!(bound.is_empty());
        assert!(matches!(
            &errors[..],
            [RegistrationError::UnknownOverride { key }] if key == "Handlr"
        ));
    }

    #[test]
    fn path_key_wins_over_bare_name() {
        let mut overrides = DecoratorOverrides::new();
        overrides.set(
            "PingHandler",
            "Tag1",
            DecoratorOverride {
                order: Some(1),
                config: None,
            },
        );
        overrides.set(
            "app::PingHandler",
            "Tag1",
            DecoratorOverride {
                order: Some(2),
                config: None,
            },
        );

        let (bound, errors) = overrides.bind(HANDLERS);
        assert!(errors.is_empty());
        assert_eq!(bound.get("app::PingHandler", "Tag1").unwrap().order, Some(2));
    }
}
