// ABOUTME: Linked environment frames implementing name lookup and distance-based resolution

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::RuntimeError;
use crate::value::Value;

/// A single frame of bindings with an optional parent. Shared via `Rc` because closures and
/// nested blocks may keep the same frame alive from multiple places; `RefCell` gives the
/// interior mutability `define`/`assign` need without a mutable borrow of the whole chain.
pub struct Environment {
    bindings: RefCell<HashMap<String, Value>>,
    parent: Option<Rc<Environment>>,
}

impl Environment {
    pub fn new_global() -> Rc<Environment> {
        Rc::new(Environment {
            bindings: RefCell::new(HashMap::new()),
            parent: None,
        })
    }

    pub fn with_parent(parent: &Rc<Environment>) -> Rc<Environment> {
        Rc::new(Environment {
            bindings: RefCell::new(HashMap::new()),
            parent: Some(Rc::clone(parent)),
        })
    }

    pub fn define(&self, name: &str, value: Value) {
        self.bindings.borrow_mut().insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str, line: usize) -> Result<Value, RuntimeError> {
        if let Some(value) = self.bindings.borrow().get(name) {
            return Ok(value.clone());
        }
        if let Some(parent) = &self.parent {
            return parent.get(name, line);
        }
        Err(RuntimeError::UndefinedVariable {
            name: name.to_string(),
            line,
        })
    }

    pub fn assign(&self, name: &str, value: Value, line: usize) -> Result<(), RuntimeError> {
        if self.bindings.borrow().contains_key(name) {
            self.bindings.borrow_mut().insert(name.to_string(), value);
            return Ok(());
        }
        if let Some(parent) = &self.parent {
            return parent.assign(name, value, line);
        }
        Err(RuntimeError::UndefinedVariable {
            name: name.to_string(),
            line,
        })
    }

    fn ancestor(self: &Rc<Self>, distance: usize) -> Rc<Environment> {
        let mut env = Rc::clone(self);
        for _ in 0..distance {
            env = Rc::clone(
                env.parent
                    .as_ref()
                    .expect("resolver guarantees distance terminates in an owning frame"),
            );
        }
        env
    }

    pub fn get_at(self: &Rc<Self>, distance: usize, name: &str, line: usize) -> Result<Value, RuntimeError> {
        let frame = self.ancestor(distance);
        let value = frame.bindings.borrow().get(name).cloned();
        value.ok_or(RuntimeError::UndefinedVariable {
            name: name.to_string(),
            line,
        })
    }

    pub fn assign_at(
        self: &Rc<Self>,
        distance: usize,
        name: &str,
        value: Value,
        line: usize,
    ) -> Result<(), RuntimeError> {
        let frame = self.ancestor(distance);
        if frame.bindings.borrow().contains_key(name) {
            frame.bindings.borrow_mut().insert(name.to_string(), value);
            return Ok(());
        }
        Err(RuntimeError::UndefinedVariable {
            name: name.to_string(),
            line,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_and_get() {
        let env = Environment::new_global();
        env.define("x", Value::Number(1.0));
        assert_eq!(env.get("x", 1).unwrap(), Value::Number(1.0));
    }

    #[test]
    fn undefined_name_errors() {
        let env = Environment::new_global();
        assert!(env.get("missing", 1).is_err());
    }

    #[test]
    fn shadowing_in_child_frame() {
        let global = Environment::new_global();
        global.define("x", Value::Number(1.0));
        let child = Environment::with_parent(&global);
        child.define("x", Value::Number(2.0));
        assert_eq!(child.get("x", 1).unwrap(), Value::Number(2.0));
        assert_eq!(global.get("x", 1).unwrap(), Value::Number(1.0));
    }

    #[test]
    fn parent_lookup_when_not_in_child() {
        let global = Environment::new_global();
        global.define("x", Value::Number(1.0));
        let child = Environment::with_parent(&global);
        assert_eq!(child.get("x", 1).unwrap(), Value::Number(1.0));
    }

    #[test]
    fn assign_never_creates_new_binding_in_child() {
        let global = Environment::new_global();
        global.define("x", Value::Number(1.0));
        let child = Environment::with_parent(&global);
        child.assign("x", Value::Number(9.0), 1).unwrap();
        assert_eq!(global.get("x", 1).unwrap(), Value::Number(9.0));
        assert!(child.bindings.borrow().get("x").is_none());
    }

    #[test]
    fn get_at_and_assign_at_follow_distance() {
        let global = Environment::new_global();
        global.define("x", Value::Number(1.0));
        let level1 = Environment::with_parent(&global);
        let level2 = Environment::with_parent(&level1);
        assert_eq!(level2.get_at(2, "x", 1).unwrap(), Value::Number(1.0));
        level2.assign_at(2, "x", Value::Number(42.0), 1).unwrap();
        assert_eq!(global.get("x", 1).unwrap(), Value::Number(42.0));
    }
}
