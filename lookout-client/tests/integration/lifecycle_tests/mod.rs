mod test_capture_failures;
mod test_leave_mid_negotiation;
