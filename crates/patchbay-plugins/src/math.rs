//! Arithmetic on floats

use patchbay_graph::prelude::*;

fn number(value: &Value) -> f64 {
    value.as_f64().unwrap_or_default()
}

/// Multiplies its input by two
#[derive(Debug, Default)]
pub struct Double {
    input: f64,
    result: f64,
}

impl Plugin for Double {
    fn id(&self) -> &str {
        "double"
    }

    fn input_slots(&self) -> Vec<Slot> {
        vec![Slot::input("value", DataType::Float)]
    }

    fn output_slots(&self) -> Vec<Slot> {
        vec![Slot::output("result", DataType::Float)]
    }

    fn reset(&mut self) {
        self.input = 0.0;
        self.result = 0.0;
    }

    fn validate_input(&self, _slot: &Slot, value: Value) -> Value {
        Value::Float(number(&value))
    }

    fn update_input(&mut self, _slot: &Slot, value: Value) {
        self.input = number(&value);
    }

    fn update_state(&mut self, _ctx: &UpdateContext) -> bool {
        self.result = self.input * 2.0;
        true
    }

    fn update_output(&mut self, _slot: &Slot) -> Value {
        Value::Float(self.result)
    }
}

/// Two float operands combined by a binary function
#[derive(Debug)]
pub struct Binary {
    id: &'static str,
    op: fn(f64, f64) -> f64,
    identity: f64,
    a: f64,
    b: f64,
    result: Option<f64>,
}

impl Binary {
    /// `a * b`, inputs default to one
    #[must_use]
    pub fn multiply() -> Self {
        Self {
            id: "multiply",
            op: |a, b| a * b,
            identity: 1.0,
            a: 1.0,
            b: 1.0,
            result: None,
        }
    }

    /// `a + b`, inputs default to zero
    #[must_use]
    pub fn add() -> Self {
        Self {
            id: "add",
            op: |a, b| a + b,
            identity: 0.0,
            a: 0.0,
            b: 0.0,
            result: None,
        }
    }
}

impl Plugin for Binary {
    fn id(&self) -> &str {
        self.id
    }

    fn input_slots(&self) -> Vec<Slot> {
        vec![
            Slot::input("a", DataType::Float).with_default(self.identity),
            Slot::input("b", DataType::Float).with_default(self.identity),
        ]
    }

    fn output_slots(&self) -> Vec<Slot> {
        vec![Slot::output("result", DataType::Float)]
    }

    fn reset(&mut self) {
        self.a = self.identity;
        self.b = self.identity;
        self.result = None;
    }

    fn validate_input(&self, _slot: &Slot, value: Value) -> Value {
        Value::Float(number(&value))
    }

    fn update_input(&mut self, slot: &Slot, value: Value) {
        match slot.index {
            0 => self.a = number(&value),
            _ => self.b = number(&value),
        }
    }

    fn update_state(&mut self, _ctx: &UpdateContext) -> bool {
        let result = (self.op)(self.a, self.b);
        self.result.replace(result) != Some(result)
    }

    fn update_output(&mut self, _slot: &Slot) -> Value {
        Value::Float(self.result.unwrap_or_else(|| (self.op)(self.a, self.b)))
    }
}
