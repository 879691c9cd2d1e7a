//! Capability that supplies attributes for product codes the store has never
//! seen.

use std::io::{BufRead, Write};

use log::warn;

use crate::models::{Category, ProductDetails};

/// Returns the attributes for `product_id`, or `None` to abandon creation.
pub trait ProductResolver: Send {
    fn describe(&mut self, product_id: &str) -> Option<ProductDetails>;
}

impl<F> ProductResolver for F
where
    F: FnMut(&str) -> Option<ProductDetails> + Send,
{
    fn describe(&mut self, product_id: &str) -> Option<ProductDetails> {
        self(product_id)
    }
}

/// Never creates products; unknown codes are reported and left alone.
#[derive(Debug, Default, Clone, Copy)]
pub struct SkipUnknown;

impl ProductResolver for SkipUnknown {
    fn describe(&mut self, product_id: &str) -> Option<ProductDetails> {
        warn!("Product {product_id} not in inventory; creation skipped");
        None
    }
}

/// Asks an operator for the new product's attributes, line by line.
pub struct PromptResolver<R, W> {
    input: R,
    output: W,
}

impl PromptResolver<std::io::BufReader<std::io::Stdin>, std::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(std::io::BufReader::new(std::io::stdin()), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> PromptResolver<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn ask(&mut self, prompt: &str) -> Option<String> {
        write!(self.output, "{prompt}").ok()?;
        self.output.flush().ok()?;

        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    }

    fn ask_parsed<T: std::str::FromStr>(&mut self, prompt: &str, field: &str) -> Option<T> {
        let raw = self.ask(prompt)?;
        match raw.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Invalid {field} '{raw}'; abandoning product entry");
                None
            }
        }
    }

    fn ask_optional(&mut self, prompt: &str) -> Option<Option<String>> {
        let raw = self.ask(prompt)?;
        Some((!raw.is_empty()).then_some(raw))
    }
}

impl<R, W> ProductResolver for PromptResolver<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    fn describe(&mut self, product_id: &str) -> Option<ProductDetails> {
        writeln!(self.output, "Product {product_id} not found in inventory.").ok()?;

        let category = self.ask("Enter category: ")?;
        if category.is_empty() {
            return None;
        }
        let category = match Category::from_columns(&category, None, None) {
            Category::Clothing { .. } => Category::Clothing {
                size: self.ask_optional("Enter size (blank to skip): ")?,
                color: self.ask_optional("Enter color (blank to skip): ")?,
            },
            other => other,
        };

        let name = self.ask("Enter product name: ")?;
        let price = self.ask_parsed("Enter price: ", "price")?;
        let quantity = self.ask_parsed("Enter quantity: ", "quantity")?;
        let return_period_days = self.ask_parsed("Enter return period (days): ", "return period")?;

        Some(ProductDetails {
            category,
            name,
            price,
            quantity,
            return_period_days,
        })
    }
}
