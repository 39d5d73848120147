//! Documented fallback USB key credential set
//!
//! Used when an administrator has no provisioned key record. The server
//! reads these as the fallback for its `USB_DEFAULT_*` configuration and the
//! login client uses them when told `useDefaultKey`; the two sides must
//! agree exactly, which is why the values live here and nowhere else.
//!
//! This is a bootstrap affordance: deployments should rotate the values and
//! retire the fallback once every administrator carries a provisioned record.

/// Default device PIN
pub const DEFAULT_USB_PIN: &str = "123";

/// Default device public key, X coordinate (hex)
pub const DEFAULT_USB_PUBKEY_X: &str =
    "09F9DF311E5421A150DD7D161E4BC5C672179FAD1833FC076BB08FF356F35020";

/// Default device public key, Y coordinate (hex)
pub const DEFAULT_USB_PUBKEY_Y: &str =
    "CCEA490CE26775A52DC6EA718CC1AA600AED05FBF35E084A6632F6072DA9AD13";
