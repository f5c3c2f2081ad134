// Merge accepted labels that render identically so the text layer can share
// one glyph run per group.

use std::sync::Arc;

use super::label::Label;
use super::pool::{LabelHandle, LabelList, LabelPool};

fn same_group(a: &Label, b: &Label) -> bool {
    Arc::ptr_eq(&a.style, &b.style)
        && a.width == b.width
        && (Arc::ptr_eq(&a.text, &b.text) || a.text == b.text)
}

/// Reorder `list` so that every label sharing style, width and text with an
/// earlier one follows it directly, and give all members the first label's
/// text. Members need not have been adjacent. `order` is scratch space.
pub fn group_labels(pool: &mut LabelPool, list: &mut LabelList, order: &mut Vec<LabelHandle>) {
    pool.collect_handles(list, order);
    if order.len() < 2 {
        return;
    }

    let mut cur = 0;
    while cur < order.len() {
        let mut insert_at = cur + 1;
        for j in cur + 1..order.len() {
            let (head, candidate) = (order[cur], order[j]);
            let text = {
                let (a, b) = (pool.get(head), pool.get(candidate));
                if !same_group(a, b) {
                    continue;
                }
                a.text.clone()
            };
            pool.get_mut(candidate).text = text;
            if j != insert_at {
                order[insert_at..=j].rotate_right(1);
            }
            insert_at += 1;
        }
        cur = insert_at;
    }

    pool.relink(list, order);
}
