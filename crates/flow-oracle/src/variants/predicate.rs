use std::fmt;
use std::sync::Arc;

use flow_core::Value;

use crate::checker::{Check, ConditionChecker, Verdict};

pub type PredicateFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Cada valor debe cumplir el predicado. Se registra el primer fallo.
pub struct Predicate {
    test: PredicateFn,
    description: String,
    seen: u64,
    first_failure: Option<(u64, Value)>,
}

impl Predicate {
    pub fn new(description: impl Into<String>, test: PredicateFn) -> Self {
        Self { test,
               description: description.into(),
               seen: 0,
               first_failure: None }
    }

    pub fn checker(self, name: impl Into<String>) -> ConditionChecker<Self> {
        ConditionChecker::new(name, self)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate")
         .field("description", &self.description)
         .field("seen", &self.seen)
         .field("first_failure", &self.first_failure)
         .finish()
    }
}

impl Check for Predicate {
    /// Primer valor rechazado.
    type Output = Option<Value>;
    const KIND: &'static str = "predicate";

    fn check(&mut self, count: u64, value: &Value) -> Verdict {
        self.seen = count;
        if (self.test)(value) {
            return Verdict::Valid;
        }
        if self.first_failure.is_none() {
            self.first_failure = Some((count, value.clone()));
        }
        Verdict::Fail(format!("value #{count} {value} does not satisfy {}", self.description))
    }

    fn result(&self) -> Option<Value> {
        self.first_failure.as_ref().map(|(_, v)| v.clone())
    }

    fn expected(&self) -> String {
        format!("every value to satisfy {}", self.description)
    }

    fn received(&self) -> String {
        match &self.first_failure {
            Some((n, v)) => format!("{} values, first rejected #{n} {v}", self.seen),
            None => format!("{} values", self.seen),
        }
    }
}
