use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::Instant;

use log::debug;

/// Collects the wall-clock time of named phases of a computation.
#[derive(Default)]
pub struct Timing {
    results: Rc<RefCell<Vec<(String, f64)>>>,
}

/// A running measurement, registered in its [Timing] when it is finished or
/// dropped.
pub struct Timer {
    name: String,
    start: Instant,
    results: Rc<RefCell<Vec<(String, f64)>>>,
    registered: bool,
}

impl Timing {
    /// Creates an empty collection of measurements.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts measuring the phase with the given name.
    pub fn start(&mut self, name: &str) -> Timer {
        Timer {
            name: name.to_string(),
            start: Instant::now(),
            results: self.results.clone(),
            registered: false,
        }
    }

    /// Returns the finished measurements in seconds, in the order they finished.
    pub fn results(&self) -> Vec<(String, f64)> {
        self.results.borrow().clone()
    }

    /// Prints all measurements to stderr.
    pub fn print(&self) {
        eprint!("{self}");
    }
}

impl fmt::Display for Timing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, time) in self.results.borrow().iter() {
            writeln!(f, "Time {name}: {time:.3}s")?;
        }

        Ok(())
    }
}

impl Timer {
    /// Stops the measurement and registers its duration.
    pub fn finish(&mut self) {
        if self.registered {
            return;
        }

        let elapsed = self.start.elapsed().as_secs_f64();
        debug!("Time {}: {:.3}s", self.name, elapsed);
        self.results.borrow_mut().push((self.name.clone(), elapsed));
        self.registered = true;
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.finish();
    }
}
