use serde::{Deserialize, Serialize};

use crate::checker::{Check, ConditionChecker, Verdict};
use flow_core::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CountMode {
    Exact,
    AtLeast,
}

/// Cuenta de valores: exacta o mínima.
#[derive(Debug, Clone)]
pub struct TupleCount {
    expected: u64,
    mode: CountMode,
    seen: u64,
}

impl TupleCount {
    pub fn new(expected: u64, mode: CountMode) -> Self {
        Self { expected,
               mode,
               seen: 0 }
    }

    pub fn exact(expected: u64) -> Self {
        Self::new(expected, CountMode::Exact)
    }

    pub fn at_least(expected: u64) -> Self {
        Self::new(expected, CountMode::AtLeast)
    }

    pub fn checker(self, name: impl Into<String>) -> ConditionChecker<Self> {
        ConditionChecker::new(name, self)
    }
}

impl Check for TupleCount {
    type Output = u64;
    const KIND: &'static str = "tuple_count";

    fn initial(&self) -> Verdict {
        if self.expected == 0 {
            Verdict::Valid
        } else {
            Verdict::Pending
        }
    }

    fn check(&mut self, count: u64, _value: &Value) -> Verdict {
        self.seen = count;
        match self.mode {
            CountMode::Exact if count > self.expected => {
                Verdict::Fail(format!("too many tuples: expected {}, received {count}", self.expected))
            }
            _ if count >= self.expected => Verdict::Valid,
            _ => Verdict::Pending,
        }
    }

    fn result(&self) -> u64 {
        self.seen
    }

    fn expected(&self) -> String {
        match self.mode {
            CountMode::Exact => format!("exactly {} tuples", self.expected),
            CountMode::AtLeast => format!("at least {} tuples", self.expected),
        }
    }

    fn received(&self) -> String {
        format!("{} tuples", self.seen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(c: &ConditionChecker<TupleCount>, n: i64) {
        for i in 0..n {
            c.accept(&Value::Int(i));
        }
    }

    #[test]
    fn exact_zero_is_valid_before_any_tuple() {
        let c = TupleCount::exact(0).checker("zero");
        assert!(c.valid());
        assert_eq!(c.result(), 0);
        feed(&c, 1);
        assert!(c.failed());
    }

    #[test]
    fn exact_count_fails_on_too_many() {
        let c = TupleCount::exact(3).checker("three");
        feed(&c, 2);
        assert!(!c.valid() && !c.failed());
        feed(&c, 1);
        assert!(c.valid());
        feed(&c, 1);
        assert!(c.failed() && !c.valid());
        assert!(c.to_string().contains("too many tuples: expected 3, received 4"));
    }

    #[test]
    fn at_least_stays_valid_after_threshold() {
        let c = TupleCount::at_least(26).checker("letters");
        feed(&c, 25);
        assert!(!c.valid());
        feed(&c, 7);
        assert!(c.valid() && !c.failed());
        assert!(c.result() >= 26);
        assert_eq!(c.result(), 32);
    }
}
