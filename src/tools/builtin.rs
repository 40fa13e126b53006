//! 本地固定工具集：calculator、getCurrentTime
//!
//! 参数 schema 由 schemars 从参数结构体生成。

use schemars::{schema_for, JsonSchema};

use super::ToolDescriptor;

/// 四则运算
#[allow(dead_code)]
#[derive(JsonSchema)]
#[serde(rename_all = "lowercase")]
enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
}

#[allow(dead_code)]
#[derive(JsonSchema)]
struct CalculatorArgs {
    operation: Operation,
    /// First number
    a: f64,
    /// Second number
    b: f64,
}

#[allow(dead_code)]
#[derive(JsonSchema)]
struct CurrentTimeArgs {}

fn schema_value<T: JsonSchema>() -> serde_json::Value {
    serde_json::to_value(schema_for!(T)).unwrap_or_else(|_| serde_json::json!({"type": "object"}))
}

pub fn calculator() -> ToolDescriptor {
    ToolDescriptor::new(
        "calculator",
        "Useful for performing mathematical calculations",
        schema_value::<CalculatorArgs>(),
    )
}

pub fn current_time() -> ToolDescriptor {
    ToolDescriptor::new(
        "getCurrentTime",
        "Get the current date and time",
        schema_value::<CurrentTimeArgs>(),
    )
}

/// 本地工具全集
pub fn local_tools() -> Vec<ToolDescriptor> {
    vec![calculator(), current_time()]
}
