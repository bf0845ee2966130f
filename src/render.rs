use crate::controller::Reply;
use anyhow::Result;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Json,
}

pub fn render<W: Write>(out: &mut W, format: Format, reply: &Reply) -> Result<()> {
    match format {
        Format::Json => {
            if matches!(reply, Reply::Idle) {
                return Ok(());
            }
            serde_json::to_writer(&mut *out, reply)?;
            writeln!(out)?;
        }
        Format::Text => write!(out, "{}", render_text(reply))?,
    }
    out.flush()?;
    Ok(())
}

pub fn render_text(reply: &Reply) -> String {
    match reply {
        Reply::Summary { summary } => format!("Summary (<=150 words):\n{}\n", summary.text),
        Reply::SummaryUnavailable { error } => format!(
            "warning: summary unavailable: {} ({})\n",
            error.message, error.remedy
        ),
        Reply::Answer { answer, confidence } => format!(
            "Answer:\n{}\nAnswer confidence score: {}\n",
            answer.text, confidence
        ),
        Reply::Questions { questions } => {
            let mut s = String::from("Answer these questions:\n");
            for q in questions {
                s.push_str(&format!("Q{}. {}\n", q.index, q.text));
            }
            s
        }
        Reply::NoQuestions { warning } => format!("warning: {warning}\n"),
        Reply::Error { error } => format!("error: {} ({})\n", error.message, error.remedy),
        Reply::ModeSelected { mode } => format!("mode: {mode}\n"),
        Reply::Notice { message } => format!("{message}\n"),
        Reply::Idle => String::new(),
    }
}
