//! # stegdrop - single-view secret messages hidden in images
//!
//! A sender encrypts a short text message, hides the ciphertext in the least
//! significant bits of a cover image and gets back an access token. The
//! recipient redeems the token together with a secret code agreed on during
//! pairing. The message can be revealed exactly once.
//!
//! ## Security Model
//!
//! - **Three independent gates**: the access token (a bearer capability), the
//!   recipient identity, and the secret code commitment must all check out
//! - **Encrypt then hide**: the image only carries authenticated ciphertext
//!   (HKDF + ChaCha20Poly1305), so extraction alone reveals nothing
//! - **Single view**: the viewed flag is claimed with an atomic test-and-set
//!   before decryption, so concurrent reveals cannot both succeed
//! - **Nothing reusable at rest**: tokens and codes are stored only as
//!   SHA-256 digests
//!
//! ## Example Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use stegdrop::crypto::MessageKey;
//! use stegdrop::stego::CoverImage;
//! use stegdrop::store::{MemoryArtifactStore, MemoryStore};
//! use stegdrop::{Postbox, UserId};
//!
//! let postbox = Postbox::new(
//!     MessageKey::generate(),
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(MemoryArtifactStore::new()),
//! );
//! let (alice, bob) = (UserId::new("alice"), UserId::new("bob"));
//!
//! // Pair under a shared secret code
//! let request = postbox.request_pairing(&alice, &bob, "kiwi").unwrap();
//! postbox.accept_pairing(&request.id, &bob, "kiwi").unwrap();
//!
//! // Send: any lossless cover image works
//! let cover = image::RgbaImage::from_pixel(64, 64, image::Rgba([90, 120, 200, 255]));
//! let cover = CoverImage::from_rgba(cover).to_png_bytes().unwrap();
//! let receipt = postbox.send(&alice, &bob, &cover, "meet at noon").unwrap();
//!
//! // Reveal once
//! let revealed = postbox
//!     .reveal(receipt.token.as_str(), Some(&bob), Some("kiwi"))
//!     .unwrap();
//! assert_eq!(revealed.plaintext, "meet at noon");
//! assert!(postbox.reveal(receipt.token.as_str(), Some(&bob), Some("kiwi")).is_err());
//! ```
//!
//! ## Modules
//!
//! - [`stego`]: LSB bit codec over RGBA images and the length-prefixed framer
//! - [`crypto`]: message key, symmetric encryption, code commitments, tokens
//! - [`store`]: message, pairing and artifact persistence (sled, in-memory)
//! - [`config`]: TOML + environment configuration
//! - [`postbox`]: the wired-up service; pairing, send and reveal live in
//!   [`pairing`], [`send`] and [`reveal`]

pub mod config;
pub mod crypto;
pub mod ids;
pub mod pairing;
pub mod postbox;
pub mod reveal;
pub mod send;
pub mod stego;
pub mod store;

// Re-export commonly used types at the crate root
pub use config::{Config, ConfigError};
pub use ids::{ArtifactRef, MessageId, PairingId, UserId};
pub use pairing::PairingError;
pub use postbox::{InboxEntry, Postbox};
pub use reveal::{PendingReveal, RevealError, Revealed, StatusClass};
pub use send::{SendError, SendReceipt};
