pub mod concurrency;

#[cfg(test)]
pub mod test_helpers;
