pub mod baseline_marketgod;
