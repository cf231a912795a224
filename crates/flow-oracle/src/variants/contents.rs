//! Contenido esperado: secuencia ordenada o multiconjunto.
//!
//! El caso sin orden elimina cada valor recibido, de forma lineal, de una
//! copia del multiconjunto esperado: O(n²) en el tamaño esperado. Pensado
//! para conjuntos pequeños de test.
use flow_core::Value;

use crate::checker::{Check, ConditionChecker, Verdict};

#[derive(Debug, Clone)]
pub struct Contents {
    expected: Vec<Value>,
    ordered: bool,
    received: Vec<Value>,
}

fn render(values: &[Value]) -> String {
    let items: Vec<String> = values.iter().map(Value::to_string).collect();
    format!("[{}]", items.join(", "))
}

/// Primer valor recibido que no puede retirarse del multiconjunto esperado.
fn first_unmatched<'a>(expected: &[Value], received: &'a [Value]) -> Option<&'a Value> {
    let mut scratch: Vec<&Value> = expected.iter().collect();
    for value in received {
        match scratch.iter().position(|e| *e == value) {
            Some(i) => {
                scratch.swap_remove(i);
            }
            None => return Some(value),
        }
    }
    None
}

impl Contents {
    pub fn ordered(expected: Vec<Value>) -> Self {
        Self { expected,
               ordered: true,
               received: Vec::new() }
    }

    pub fn unordered(expected: Vec<Value>) -> Self {
        Self { expected,
               ordered: false,
               received: Vec::new() }
    }

    pub fn checker(self, name: impl Into<String>) -> ConditionChecker<Self> {
        ConditionChecker::new(name, self)
    }
}

impl Check for Contents {
    type Output = Vec<Value>;
    const KIND: &'static str = "contents";

    fn initial(&self) -> Verdict {
        if self.expected.is_empty() {
            Verdict::Valid
        } else {
            Verdict::Pending
        }
    }

    fn check(&mut self, _count: u64, value: &Value) -> Verdict {
        self.received.push(value.clone());
        let n = self.received.len();
        if n > self.expected.len() {
            return Verdict::Fail(format!("unexpected extra value #{n} {value}: expected only {} values",
                                         self.expected.len()));
        }
        if self.ordered {
            let want = &self.expected[n - 1];
            if want != value {
                return Verdict::Fail(format!("value #{n} mismatch: expected {want} but received {value}"));
            }
            return if n == self.expected.len() { Verdict::Valid } else { Verdict::Pending };
        }
        if n < self.expected.len() {
            return Verdict::Pending;
        }
        match first_unmatched(&self.expected, &self.received) {
            None => Verdict::Valid,
            Some(v) => Verdict::Fail(format!("received {v} not in expected set; expected {} received {}",
                                             render(&self.expected),
                                             render(&self.received))),
        }
    }

    fn result(&self) -> Vec<Value> {
        self.received.clone()
    }

    fn expected(&self) -> String {
        let order = if self.ordered { "ordered" } else { "unordered" };
        format!("{order} {}", render(&self.expected))
    }

    fn received(&self) -> String {
        render(&self.received)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn letters(s: &str) -> Vec<Value> {
        s.chars().map(|c| Value::String(c.to_string())).collect()
    }

    #[test]
    fn ordered_is_valid_only_after_last() {
        let c = Contents::ordered(letters("abc")).checker("abc");
        for v in letters("ab") {
            c.accept(&v);
            assert!(!c.valid());
        }
        c.accept(&Value::from("c"));
        assert!(c.valid());
        assert_eq!(c.result(), letters("abc"));
    }

    #[test]
    fn ordered_fails_on_first_mismatch() {
        let c = Contents::ordered(letters("abc")).checker("abc");
        c.accept(&Value::from("b"));
        assert!(c.failed());
        let text = c.to_string();
        assert!(text.contains("value #1 mismatch: expected \"a\" but received \"b\""), "{text}");
    }

    #[test]
    fn unordered_accepts_every_permutation() {
        let expected = letters("aab");
        for perm in ["aab", "aba", "baa"] {
            let c = Contents::unordered(expected.clone()).checker("perm");
            for v in letters(perm) {
                c.accept(&v);
            }
            assert!(c.valid(), "{perm}: {c}");
        }
    }

    #[test]
    fn unordered_extra_value_fails_after_full_set() {
        let c = Contents::unordered(letters("xy")).checker("xy");
        for v in letters("yx") {
            c.accept(&v);
        }
        assert!(c.valid());
        c.accept(&Value::from("x"));
        assert!(c.failed() && !c.valid());
    }

    #[test]
    fn unordered_mismatch_shows_both_sets() {
        let c = Contents::unordered(letters("ab")).checker("ab");
        c.accept(&Value::from("a"));
        c.accept(&Value::from("a"));
        assert!(c.failed());
        let text = c.to_string();
        assert!(text.contains("expected [\"a\", \"b\"] received [\"a\", \"a\"]"), "{text}");
    }

    #[test]
    fn empty_expectation_is_valid_immediately() {
        let c = Contents::unordered(Vec::new()).checker("none");
        assert!(c.valid());
    }
}
