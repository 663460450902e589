// Intentionally empty: this crate only carries the tests/ directory.
