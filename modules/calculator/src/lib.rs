//! Calculator module, first generation: the basic operations.

use hotplug_plugin_api::{declare_module, Module};

pub struct CalculatorModule {
    name: String,
    version: String,
    running: bool,
    last_result: f64,
    operation_count: u32,
}

impl CalculatorModule {
    pub fn new() -> Self {
        Self {
            name: "Calculator".to_string(),
            version: "1.0.0".to_string(),
            running: false,
            last_result: 0.0,
            operation_count: 0,
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

    pub fn last_result(&self) -> f64 {
        self.last_result
    }

    pub fn operation_count(&self) -> u32 {
        self.operation_count
    }

    fn apply(&mut self, result: f64) -> f64 {
        self.last_result = result;
        self.operation_count += 1;
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
