// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Common Test Utilities
//!
//! Fixtures, a scripted relay server and proptest strategies shared by the
//! integration tests.

#![allow(dead_code)]

pub mod fixtures;
pub mod server;
pub mod strategies;
