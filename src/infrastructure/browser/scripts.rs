//! Page scripts used by the Chromium surface.
//!
//! Every script runs inside the same wrapper: the element registry is
//! installed (once per document) as `fa`, call arguments are bound to `args`,
//! and the body returns `{ value }` or `{ stale: true }`.

/// Per-document registry giving DOM elements stable string ids.
const REGISTRY: &str = r#"
const fa = window.__followApprover || (window.__followApprover = (() => {
  let next = 1;
  const ids = new WeakMap();
  const refs = new Map();
  return {
    id(el) {
      let id = ids.get(el);
      if (!id) {
        id = 'fa-' + next++;
        ids.set(el, id);
        refs.set(id, new WeakRef(el));
      }
      return id;
    },
    get(id) {
      const ref = refs.get(id);
      const el = ref && ref.deref();
      return el && el.isConnected ? el : null;
    },
  };
})());
"#;

/// Prefix a body with the lookup of `args.id`.
macro_rules! element_script {
    ($body:literal) => {
        concat!(
            "const el = fa.get(args.id); if (!el) return { stale: true };\n",
            $body
        )
    };
}

pub fn wrap(body: &str, args: &serde_json::Value) -> String {
    format!(
        "(() => {{\n{}\nconst args = {};\n{}\n}})()",
        REGISTRY, args, body
    )
}

pub const FIND_CONTAINER: &str = r#"
for (const sel of args.selectors) {
  let el = null;
  try { el = document.querySelector(sel); } catch (e) { continue; }
  if (el && el.getClientRects().length > 0) return { value: fa.id(el) };
}
return { value: null };
"#;

pub const IS_PRESENT: &str = element_script!(
    "return { value: el.getClientRects().length > 0 };"
);

pub const LIST_BUTTONS: &str = element_script!(
    r#"return { value: Array.from(el.querySelectorAll('button, [role="button"]')).map(b => fa.id(b)) };"#
);

// Page coordinates, so positions compare correctly across a scrolled viewport
pub const LIST_LINKS: &str = element_script!(
    r#"
return { value: Array.from(el.querySelectorAll('a[href]')).map(a => {
  const r = a.getBoundingClientRect();
  return {
    id: fa.id(a),
    href: a.getAttribute('href') || '',
    rect: { x: r.left + window.scrollX, y: r.top + window.scrollY, width: r.width, height: r.height },
  };
}) };
"#
);

pub const RECT: &str = element_script!(
    r#"
const r = el.getBoundingClientRect();
return { value: { x: r.left + window.scrollX, y: r.top + window.scrollY, width: r.width, height: r.height } };
"#
);

/// Viewport coordinates, for input events.
pub const VIEWPORT_RECT: &str = element_script!(
    r#"
const r = el.getBoundingClientRect();
const inView = r.bottom > 0 && r.right > 0 && r.top < window.innerHeight && r.left < window.innerWidth;
return { value: inView ? { x: r.left, y: r.top, width: r.width, height: r.height } : { x: 0, y: 0, width: 0, height: 0 } };
"#
);

pub const LABELS: &str = element_script!(
    r#"
const labels = [el.innerText, el.getAttribute('aria-label'), el.getAttribute('title')]
  .filter(l => typeof l === 'string' && l.trim().length > 0)
  .map(l => l.trim());
return { value: labels };
"#
);

pub const IS_DISABLED: &str = element_script!(
    r#"return { value: el.disabled === true || el.getAttribute('aria-disabled') === 'true' };"#
);

pub const TEXT: &str = element_script!("return { value: el.textContent || '' };");

/// Unlike the other element scripts, a `null` value here means the root.
pub const PARENT: &str = element_script!(
    "const p = el.parentElement; return { value: p ? fa.id(p) : null };"
);

pub const SCROLL_INTO_VIEW: &str = element_script!(
    "el.scrollIntoView({ behavior: 'smooth', block: 'center' }); return { value: true };"
);

pub const DISPATCH_CLICK: &str = element_script!(
    r#"
el.dispatchEvent(new MouseEvent('click', { bubbles: true, cancelable: true, view: window }));
return { value: true };
"#
);

pub const SCROLL_TO_END: &str = element_script!(
    r#"
let target = el;
while (target && target !== document.body && target.scrollHeight <= target.clientHeight) {
  target = target.parentElement;
}
if (target && target !== document.body) {
  target.scrollTop = target.scrollHeight;
} else {
  window.scrollTo(0, document.documentElement.scrollHeight);
}
return { value: true };
"#
);
