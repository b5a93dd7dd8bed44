//! End-to-end scenarios for the SAML handler chain live under `tests/`.
