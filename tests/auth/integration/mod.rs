mod test_entity_lifecycle;
mod test_logout;
mod test_password_reset;
mod test_registration;
