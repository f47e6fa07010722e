// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Variable scopes for template execution.
//!
//! A [`Scope`] layers a stack of frames over the base [`Context`]. Loops and
//! template function calls push a frame for their bindings; lookups search
//! frames innermost first and then fall back to the base mapping, so an
//! inner binding shadows an outer one for exactly the lifetime of its frame.
//!
//! Frames are pushed through [`Scope::push_frame`], which returns a
//! [`FrameGuard`]. The guard pops the frame when dropped, including when a
//! directive inside the frame fails and the error propagates.

use crate::value::{Context, Value};
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

/// One set of bindings pushed for the duration of a loop body or call.
pub type Frame = HashMap<String, Value>;

/// The variables visible to a directive while a template executes.
///
/// Each execution owns its own scope; only the base context is shared with
/// the caller.
#[derive(Debug)]
pub struct Scope<'a> {
    data: &'a mut Context,
    frames: Vec<Frame>,
}

impl<'a> Scope<'a> {
    /// Creates a scope with no frames over `data`.
    pub fn new(data: &'a mut Context) -> Self {
        Self {
            data,
            frames: Vec::new(),
        }
    }

    /// Resolves a name, innermost frame first, then the base mapping.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(name))
            .or_else(|| self.data.get(name))
    }

    /// Assigns a name in the innermost frame, or in the base mapping when
    /// no frame is active.
    pub fn assign(&mut self, name: &str, value: Value) {
        match self.frames.last_mut() {
            Some(frame) => {
                frame.insert(name.to_string(), value);
            }
            None => self.data.insert(name, value),
        }
    }

    /// Pushes an empty frame; it is popped when the guard drops.
    pub fn push_frame(&mut self) -> FrameGuard<'_, 'a> {
        self.frames.push(Frame::new());
        tracing::trace!(depth = self.frames.len(), "pushed scope frame");
        FrameGuard { scope: self }
    }

    /// Number of active frames.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// The base data mapping.
    pub fn data(&self) -> &Context {
        &*self.data
    }

    /// Renders the frames for diagnostics, outermost first.
    pub fn describe(&self) -> String {
        if self.frames.is_empty() {
            return "[]".to_string();
        }
        let frames: Vec<String> = self
            .frames
            .iter()
            .map(|frame| {
                let mut names: Vec<(&String, &Value)> = frame.iter().collect();
                names.sort_by(|a, b| a.0.cmp(b.0));
                let entries: Vec<String> = names
                    .into_iter()
                    .map(|(k, v)| format!("'{}': {}", k, v.repr()))
                    .collect();
                format!("{{{}}}", entries.join(", "))
            })
            .collect();
        format!("[{}]", frames.join(", "))
    }
}

/// Keeps a scope frame alive; popping it on drop.
///
/// Dereferences to the [`Scope`] so the frame's body executes through it.
#[derive(Debug)]
pub struct FrameGuard<'s, 'a> {
    scope: &'s mut Scope<'a>,
}

impl<'a> Deref for FrameGuard<'_, 'a> {
    type Target = Scope<'a>;

    fn deref(&self) -> &Scope<'a> {
        self.scope
    }
}

impl<'a> DerefMut for FrameGuard<'_, 'a> {
    fn deref_mut(&mut self) -> &mut Scope<'a> {
        self.scope
    }
}

impl Drop for FrameGuard<'_, '_> {
    fn drop(&mut self) {
        self.scope.frames.pop();
        tracing::trace!(depth = self.scope.frames.len(), "popped scope frame");
    }
}
