// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! FLAC stream-level codecs: metadata blocks, the frame header, and PCM validation.

pub mod frame;
pub mod metadata;
pub mod validate;
