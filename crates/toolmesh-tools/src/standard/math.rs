//! Arithmetic tools: `add`, `subtract`, `multiply`, `divide`.
//!
//! All four take two required `number` parameters `a` and `b` and return one
//! text item holding the result. When both operands are JSON integers,
//! `add`/`subtract`/`multiply` stay in checked 64-bit integer arithmetic and
//! print an integer (`8`); on overflow, or with any float operand, they fall
//! back to floating point. `divide` always yields a float (`48.0`) and reports
//! a zero divisor as `DivisionByZero`.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use toolmesh_core::{
    Arguments, ContentItem, ParamSpec, ParamType, RegistryError, ToolDescriptor, ToolError,
    ToolResult,
};

use crate::registry::{ToolHandler, ToolRegistry};

/// A numeric operand or result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    Integer(i64),
    Float(f64),
}

impl Numeric {
    /// Read a JSON number. Integers outside `i64` become floats.
    pub fn from_json(parameter: &str, value: &Value) -> ToolResult<Self> {
        if let Some(i) = value.as_i64() {
            Ok(Numeric::Integer(i))
        } else if let Some(f) = value.as_f64() {
            Ok(Numeric::Float(f))
        } else {
            Err(ToolError::invalid_argument(parameter, "expected number"))
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            Numeric::Integer(i) => *i as f64,
            Numeric::Float(f) => *f,
        }
    }
}

impl fmt::Display for Numeric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Numeric::Integer(i) => write!(f, "{}", i),
            // Whole floats keep one decimal so they read as floats: 48.0
            Numeric::Float(x) if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e16 => {
                write!(f, "{:.1}", x)
            }
            Numeric::Float(x) => write!(f, "{}", x),
        }
    }
}

/// One of the four arithmetic operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::Add,
        Operation::Subtract,
        Operation::Multiply,
        Operation::Divide,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Operation::Add => "add",
            Operation::Subtract => "subtract",
            Operation::Multiply => "multiply",
            Operation::Divide => "divide",
        }
    }

    pub fn descriptor(&self) -> ToolDescriptor {
        let (description, verb) = match self {
            Operation::Add => ("Add two numbers together.", "add"),
            Operation::Subtract => (
                "Subtract the second number from the first number.",
                "subtract",
            ),
            Operation::Multiply => ("Multiply two numbers together.", "multiply"),
            Operation::Divide => ("Divide the first number by the second number.", "divide"),
        };

        ToolDescriptor::new(self.name(), description)
            .with_param(ParamSpec::required(
                "a",
                ParamType::Number,
                format!("The first number to {}.", verb),
            ))
            .with_param(ParamSpec::required(
                "b",
                ParamType::Number,
                format!("The second number to {}.", verb),
            ))
    }

    pub fn apply(&self, a: Numeric, b: Numeric) -> ToolResult<Numeric> {
        if *self == Operation::Divide {
            let divisor = b.as_f64();
            if divisor == 0.0 {
                return Err(ToolError::DivisionByZero);
            }
            return Ok(Numeric::Float(a.as_f64() / divisor));
        }

        let exact = match (a, b) {
            (Numeric::Integer(x), Numeric::Integer(y)) => self.checked_integer(x, y),
            _ => None,
        };
        Ok(exact
            .map(Numeric::Integer)
            .unwrap_or_else(|| Numeric::Float(self.float(a.as_f64(), b.as_f64()))))
    }

    fn checked_integer(&self, x: i64, y: i64) -> Option<i64> {
        match self {
            Operation::Add => x.checked_add(y),
            Operation::Subtract => x.checked_sub(y),
            Operation::Multiply => x.checked_mul(y),
            Operation::Divide => None,
        }
    }

    fn float(&self, x: f64, y: f64) -> f64 {
        match self {
            Operation::Add => x + y,
            Operation::Subtract => x - y,
            Operation::Multiply => x * y,
            Operation::Divide => x / y,
        }
    }
}

/// Handler for one arithmetic operation.
#[derive(Debug, Clone, Copy)]
pub struct ArithmeticTool {
    operation: Operation,
}

impl ArithmeticTool {
    pub fn new(operation: Operation) -> Self {
        Self { operation }
    }
}

#[async_trait]
impl ToolHandler for ArithmeticTool {
    async fn call(&self, arguments: &Arguments) -> ToolResult<Vec<ContentItem>> {
        let operand = |name: &str| {
            arguments
                .get(name)
                .ok_or_else(|| ToolError::invalid_argument(name, "missing required parameter"))
                .and_then(|v| Numeric::from_json(name, v))
        };
        let result = self.operation.apply(operand("a")?, operand("b")?)?;
        Ok(vec![ContentItem::text(result.to_string())])
    }
}

/// Register all four arithmetic tools.
pub fn register(registry: &mut ToolRegistry) -> Result<(), RegistryError> {
    for operation in Operation::ALL {
        registry.register(operation.descriptor(), Arc::new(ArithmeticTool::new(operation)))?;
    }
    Ok(())
}
