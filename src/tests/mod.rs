mod test_utils;
mod closed_loop_test;
