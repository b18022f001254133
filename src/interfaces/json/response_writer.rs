use crate::domain::codes::ErrorCode;
use crate::error::{BillingError, Result};
use crate::interfaces::csv::command_reader::Operation;
use serde::Serialize;
use serde_json::Value;
use std::io::Write;

#[derive(Serialize)]
struct ErrorBody {
    code: ErrorCode,
    message: String,
}

#[derive(Serialize)]
struct Response<'a> {
    op: Operation,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorBody>,
}

/// Writes one JSON object per executed command, newline separated.
pub struct ResponseWriter<W: Write> {
    writer: W,
}

impl<W: Write> ResponseWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn write_result(&mut self, op: Operation, result: &Value) -> Result<()> {
        self.write(&Response {
            op,
            result: Some(result),
            error: None,
        })
    }

    pub fn write_error(&mut self, op: Operation, error: &BillingError) -> Result<()> {
        self.write(&Response {
            op,
            result: None,
            error: Some(ErrorBody {
                code: error.code(),
                message: error.to_string(),
            }),
        })
    }

    fn write(&mut self, response: &Response<'_>) -> Result<()> {
        serde_json::to_writer(&mut self.writer, response)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}
