// Arena of label slots with an intrusive free list.
//
// Slots are addressed by `LabelHandle`. The same `next` link threads a slot
// either through a `LabelList` or through the free list, never both.

use std::sync::Arc;

use super::label::{Label, SlotState};
use crate::ir::TextStyle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LabelHandle(u32);

impl LabelHandle {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Head of a singly linked list of pooled labels.
#[derive(Debug, Default)]
pub struct LabelList {
    head: Option<LabelHandle>,
}

impl LabelList {
    pub fn head(&self) -> Option<LabelHandle> {
        self.head
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }
}

#[derive(Debug)]
pub struct LabelPool {
    slots: Vec<Label>,
    free: Option<LabelHandle>,
    live: usize,
    blank_text: Arc<str>,
    blank_style: Arc<TextStyle>,
}

impl Default for LabelPool {
    fn default() -> Self {
        Self::new()
    }
}

impl LabelPool {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: None,
            live: 0,
            blank_text: Arc::from(""),
            blank_style: Arc::new(TextStyle::default()),
        }
    }

    /// Pop a slot off the free list, growing the arena only when it is empty.
    pub fn acquire(&mut self) -> LabelHandle {
        self.live += 1;
        if let Some(handle) = self.free {
            let slot = &mut self.slots[handle.index()];
            debug_assert_eq!(slot.slot, SlotState::Free);
            self.free = slot.next.take();
            slot.slot = SlotState::Detached;
            return handle;
        }
        let handle = LabelHandle(self.slots.len() as u32);
        self.slots.push(Label::blank(
            self.blank_text.clone(),
            self.blank_style.clone(),
        ));
        handle
    }

    pub fn get(&self, handle: LabelHandle) -> &Label {
        &self.slots[handle.index()]
    }

    pub fn get_mut(&mut self, handle: LabelHandle) -> &mut Label {
        &mut self.slots[handle.index()]
    }

    pub fn next(&self, handle: LabelHandle) -> Option<LabelHandle> {
        self.slots[handle.index()].next
    }

    /// Slots currently handed out.
    pub fn live(&self) -> usize {
        self.live
    }

    /// Slots ever allocated.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Link a detached label in front of `list`.
    pub fn push_front(&mut self, list: &mut LabelList, handle: LabelHandle) {
        let slot = &mut self.slots[handle.index()];
        if slot.slot != SlotState::Detached {
            report_anomaly(handle, slot.slot, "push_front");
            return;
        }
        slot.next = list.head;
        slot.slot = SlotState::Listed;
        list.head = Some(handle);
    }

    /// Cut a label loose from whatever chain it was walked from, so it can be
    /// linked elsewhere. Its former successor is returned.
    pub fn detach(&mut self, handle: LabelHandle) -> Option<LabelHandle> {
        let slot = &mut self.slots[handle.index()];
        if slot.slot == SlotState::Free {
            report_anomaly(handle, slot.slot, "detach");
            return None;
        }
        slot.slot = SlotState::Detached;
        slot.next.take()
    }

    /// Splice `handle` out of `list` and free it. Returns the label that
    /// followed it.
    pub fn release(&mut self, list: &mut LabelList, handle: LabelHandle) -> Option<LabelHandle> {
        let next = self.slots[handle.index()].next;
        if list.head == Some(handle) {
            list.head = next;
        } else {
            let mut cursor = list.head;
            let mut found = false;
            while let Some(prev) = cursor {
                let prev_slot = &mut self.slots[prev.index()];
                if prev_slot.next == Some(handle) {
                    prev_slot.next = next;
                    found = true;
                    break;
                }
                cursor = prev_slot.next;
            }
            if !found {
                // Still linked elsewhere; leave the slot where it is.
                report_anomaly(handle, self.slots[handle.index()].slot, "release");
                return next;
            }
        }
        self.free_slot(handle);
        next
    }

    /// Free a label that is not reachable from any list head, typically while
    /// walking a chain that was already taken out of its list.
    pub fn release_and_advance(&mut self, handle: LabelHandle) -> Option<LabelHandle> {
        let next = self.slots[handle.index()].next;
        self.free_slot(handle);
        next
    }

    pub fn release_all(&mut self, list: &mut LabelList) {
        let mut cursor = list.head.take();
        while let Some(handle) = cursor {
            cursor = self.release_and_advance(handle);
        }
    }

    fn free_slot(&mut self, handle: LabelHandle) {
        let slot = &mut self.slots[handle.index()];
        if slot.slot == SlotState::Free {
            report_anomaly(handle, slot.slot, "double release");
            return;
        }
        slot.slot = SlotState::Free;
        slot.item = None;
        slot.text = self.blank_text.clone();
        slot.style = self.blank_style.clone();
        slot.next = self.free;
        self.free = Some(handle);
        self.live -= 1;
    }

    pub fn iter<'a>(&'a self, list: &LabelList) -> LabelIter<'a> {
        LabelIter {
            pool: self,
            cursor: list.head,
        }
    }

    pub fn collect_handles(&self, list: &LabelList, out: &mut Vec<LabelHandle>) {
        out.clear();
        out.extend(self.iter(list).map(|(handle, _)| handle));
    }

    /// Rebuild `list` to follow `order` exactly.
    pub fn relink(&mut self, list: &mut LabelList, order: &[LabelHandle]) {
        for pair in order.windows(2) {
            self.slots[pair[0].index()].next = Some(pair[1]);
        }
        if let Some(last) = order.last() {
            self.slots[last.index()].next = None;
        }
        list.head = order.first().copied();
    }

    pub fn len(&self, list: &LabelList) -> usize {
        self.iter(list).count()
    }
}

fn report_anomaly(handle: LabelHandle, state: SlotState, op: &str) {
    if cfg!(debug_assertions) {
        panic!("label pool misuse: {op} on {handle:?} in state {state:?}");
    }
    tracing::error!(?handle, ?state, op, "label pool anomaly, dropping label");
}

pub struct LabelIter<'a> {
    pool: &'a LabelPool,
    cursor: Option<LabelHandle>,
}

impl<'a> Iterator for LabelIter<'a> {
    type Item = (LabelHandle, &'a Label);

    fn next(&mut self) -> Option<Self::Item> {
        let handle = self.cursor?;
        let label = self.pool.get(handle);
        self.cursor = label.next;
        Some((handle, label))
    }
}
