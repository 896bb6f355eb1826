//! Calculator module, second generation. Registers under the same name as
//! the first generation (it is the hot-swap payload) and adds division,
//! powers, square roots, and an operation history.

use hotplug_plugin_api::{declare_module, Module};

pub struct CalculatorModule {
    name: String,
    version: String,
    running: bool,
    last_result: f64,
    operation_count: u32,
    history: Vec<f64>,
}

impl CalculatorModule {
    pub fn new() -> Self {
        Self {
            name: "Calculator".to_string(),
            version: "2.0.0".to_string(),
            running: false,
            last_result: 0.0,
            operation_count: 0,
            history: Vec::with_capacity(100),
        }
    }

    pub fn add(&mut self, a: f64, b: f64) -> f64 {
        self.apply(a + b)
    }

    pub fn subtract(&mut self, a: f64, b: f64) -> f64 {
        self.apply(a - b)
    }

    pub fn multiply(&mut self, a: f64, b: f64) -> f64 {
        self.apply(a * b)
    }

    /// Division by zero leaves the state untouched and reports `None`.
    pub fn divide(&mut self, a: f64, b: f64) -> Option<f64> {
        if b == 0.0 {
            return None;
        }
        Some(self.apply(a / b))
    }

    pub fn power(&mut self, base: f64, exponent: f64) -> f64 {
        self.apply(base.powf(exponent))
    }

    pub fn square_root(&mut self, value: f64) -> Option<f64> {
        if value < 0.0 {
            return None;
        }
        Some(self.apply(value.sqrt()))
    }

    pub fn history(&self) -> &[f64] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn last_result(&self) -> f64 {
        self.last_result
    }

    pub fn operation_count(&self) -> u32 {
        self.operation_count
    }

    fn apply(&mut self, result: f64) -> f64 {
        self.last_result = result;
        self.operation_count += 1;
        self.history.push(result);
        result
    }
}

impl Default for CalculatorModule {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for CalculatorModule {
    fn init(&mut self) -> bool {
        self.last_result = 0.0;
        self.operation_count = 0;
        self.history.clear();
        true
    }

    fn start(&mut self) -> bool {
        self.running = true;
        true
    }

    fn stop(&mut self) -> bool {
        self.running = false;
        true
    }

    fn cleanup(&mut self) -> bool {
        self.last_result = 0.0;
        self.operation_count = 0;
        self.history.clear();
        true
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn is_healthy(&self) -> bool {
        self.running
    }
}

declare_module!(CalculatorModule, CalculatorModule::new(), c"Calculator");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_operations() {
        let mut calc = CalculatorModule::new();
        assert_eq!(calc.divide(10.0, 4.0), Some(2.5));
        assert_eq!(calc.divide(1.0, 0.0), None);
        assert_eq!(calc.power(2.0, 10.0), 1024.0);
        assert_eq!(calc.square_root(81.0), Some(9.0));
        assert_eq!(calc.square_root(-1.0), None);
    }

    #[test]
    fn test_history_records_every_result() {
        let mut calc = CalculatorModule::new();
        calc.add(1.0, 1.0);
        calc.multiply(2.0, 4.0);
        assert_eq!(calc.history(), &[2.0, 8.0]);
        calc.clear_history();
        assert!(calc.history().is_empty());
        assert_eq!(calc.operation_count(), 2);
    }

    #[test]
    fn test_identity_reports_second_generation() {
        let calc = CalculatorModule::new();
        assert_eq!(calc.name(), "Calculator");
        assert_eq!(calc.version(), "2.0.0");
    }

    #[test]
    fn test_init_resets_history() {
        let mut calc = CalculatorModule::new();
        calc.add(1.0, 2.0);
        assert!(calc.init());
        assert!(calc.history().is_empty());
        assert_eq!(calc.last_result(), 0.0);
    }
}
