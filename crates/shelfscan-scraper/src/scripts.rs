//! Scripts run in the page through WebDriver `execute`. Arguments arrive as
//! `arguments[n]`.

pub(crate) const READY_STATE: &str = "return document.readyState;";

/// Match count of the first selector in `arguments[0]` that matches
/// anything. Invalid selectors are skipped.
pub(crate) const COUNT_FIRST_MATCH: &str = r"
const selectors = arguments[0];
for (const sel of selectors) {
  let n = 0;
  try { n = document.querySelectorAll(sel).length; } catch (e) { continue; }
  if (n > 0) return n;
}
return 0;
";

pub(crate) const IS_VISIBLE: &str = r"
let el;
try {
  el = document.querySelector(arguments[0]);
} catch (e) {
  return false;
}
if (!el) return false;
const rect = el.getBoundingClientRect();
const style = window.getComputedStyle(el);
return rect.width > 0 && rect.height > 0
  && style.visibility !== 'hidden' && style.display !== 'none';
";

pub(crate) const TEXT_OF: &str = r"
let el;
try {
  el = document.querySelector(arguments[0]);
} catch (e) {
  return null;
}
if (!el) return null;
return (el.innerText || el.textContent || '').trim();
";

pub(crate) const CLICK: &str = r"
const el = document.querySelector(arguments[0]);
if (!el) return false;
el.click();
return true;
";

pub(crate) const SCROLL_BY: &str = r"
const selectors = arguments[0];
const dy = arguments[1];
for (const sel of selectors) {
  let el = null;
  try { el = document.querySelector(sel); } catch (e) { continue; }
  if (el && el.scrollHeight > el.clientHeight) {
    el.scrollBy(0, dy);
    return sel;
  }
}
window.scrollBy(0, dy);
return null;
";

/// Returns the first pre-hydration state blob found among the globals in
/// `arguments[0]`, serialized as a JSON string, or `null`.
///
/// Each name is tried as a `window` property first, then as the id of a
/// JSON `<script>` element.
pub const STATE_PROBE: &str = r"
const names = arguments[0];
for (const name of names) {
  try {
    const value = window[name];
    if (value && typeof value === 'object') {
      return JSON.stringify(value);
    }
  } catch (e) {}
  const node = document.getElementById(name);
  if (node && node.tagName === 'SCRIPT' && node.textContent) {
    return node.textContent;
  }
}
return null;
";
