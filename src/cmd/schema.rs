//! Schema command - print expected input formats

use crate::core::{InvoiceBatch, ProductRecord, ReportConfig};
use clap::Args;
use schemars::schema_for;

#[derive(Args, Debug)]
pub struct SchemaCommand {
    /// Output format: json-schema, config-schema, csv-header or csv-fields
    #[arg(value_enum, default_value = "json-schema")]
    format: SchemaFormat,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum SchemaFormat {
    /// JSON Schema for the invoice input
    JsonSchema,
    /// JSON Schema for the report configuration file
    ConfigSchema,
    /// CSV header row of the product catalogue
    CsvHeader,
    /// Product catalogue column descriptions
    CsvFields,
}

impl SchemaCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        match self.format {
            SchemaFormat::JsonSchema => {
                let schema = schema_for!(InvoiceBatch);
                println!("{}", serde_json::to_string_pretty(&schema)?);
            }
            SchemaFormat::ConfigSchema => {
                let schema = schema_for!(ReportConfig);
                println!("{}", serde_json::to_string_pretty(&schema)?);
            }
            SchemaFormat::CsvHeader => println!("{}", ProductRecord::csv_header().join(",")),
            SchemaFormat::CsvFields => self.print_csv_fields(),
        }
        Ok(())
    }

    fn print_csv_fields(&self) {
        println!("Product Catalogue CSV Format");
        println!("============================");
        println!();
        for column in ProductRecord::csv_schema() {
            let req = if column.required { "required" } else { "optional" };
            println!("{:12} ({:8})  {}", column.name, req, column.description);
        }
        println!();
        println!("A JSON catalogue maps each product id to {{\"credits\": n, \"period\": \"month\"}}");
    }
}
