//! Layout command implementation.
//!
//! Prints where each member of a predefined type lands on a platform, as a
//! table or as JSON.

use anyhow::Result;
use memlayout::{CompositeLayout, PlatformConfig};
use owo_colors::OwoColorize;
use serde::Serialize;

use super::find_type;
use super::hex_utils::format_hex_offset;

#[derive(Debug, Serialize)]
pub struct FieldEntry {
    pub name: String,
    pub r#type: String,
    pub offset: i64,
    pub size: usize,
    pub alignment: usize,
}

#[derive(Debug, Serialize)]
pub struct LayoutReport {
    pub name: String,
    pub kind: String,
    pub platform: String,
    pub size: usize,
    pub alignment: usize,
    pub start: i64,
    pub fields: Vec<FieldEntry>,
}

impl From<&CompositeLayout> for LayoutReport {
    fn from(layout: &CompositeLayout) -> Self {
        Self {
            name: layout.name().to_string(),
            kind: layout.kind().to_string(),
            platform: layout.config().to_string(),
            size: layout.size(),
            alignment: layout.alignment(),
            start: layout.start(),
            fields: layout
                .fields()
                .iter()
                .map(|field| FieldEntry {
                    name: field.name.clone(),
                    r#type: field.field.describe(),
                    offset: field.offset,
                    size: field.size,
                    alignment: field.alignment,
                })
                .collect(),
        }
    }
}

/// Compute the report for `type_name` on `config`
pub fn build_report(type_name: &str, config: &PlatformConfig) -> Result<LayoutReport> {
    let ty = find_type(type_name)?;
    let layout = ty.compute_layout(config)?;
    Ok(LayoutReport::from(layout.as_ref()))
}

/// Run the layout command
pub fn run(type_name: &str, config: PlatformConfig, json: bool) -> Result<()> {
    let report = build_report(type_name, &config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{} {} on {}",
        report.kind,
        report.name.bold(),
        report.platform.cyan()
    );
    println!(
        "size {} align {} start {}",
        report.size,
        report.alignment,
        format_hex_offset(report.start)
    );
    println!();

    let name_width = report
        .fields
        .iter()
        .map(|field| field.name.len())
        .max()
        .unwrap_or(0);
    for field in &report.fields {
        println!(
            "  {:>7}  {:<width$}  {:>4}  {}",
            format_hex_offset(field.offset),
            field.name,
            field.size,
            field.r#type.dimmed(),
            width = name_width
        );
    }

    Ok(())
}
