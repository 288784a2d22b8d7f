//! In-page JavaScript run through [`crate::platform::BrowserPlatform::execute_script`].
//!
//! Every constant is a function declaration. Arguments are passed as JSON
//! and results come back by value.

/// Attribute used to tag elements returned by [`COLLECT_CANDIDATES`].
pub const CANDIDATE_ATTR: &str = "data-tabpilot-idx";

/// Visible pointer that follows the mouse and jumps to clicked points.
pub const CURSOR_OVERLAY: &str = r#"() => {
    if (document.getElementById('tabpilot-cursor')) return true;
    if (!document.documentElement) return false;
    const cursor = document.createElement('div');
    cursor.id = 'tabpilot-cursor';
    Object.assign(cursor.style, {
        position: 'fixed',
        left: '0px',
        top: '0px',
        width: '18px',
        height: '18px',
        marginLeft: '-9px',
        marginTop: '-9px',
        borderRadius: '50%',
        background: 'rgba(255, 64, 64, 0.55)',
        border: '2px solid rgba(255, 255, 255, 0.9)',
        pointerEvents: 'none',
        zIndex: '2147483647',
        transition: 'left 0.15s ease-out, top 0.15s ease-out',
        display: 'none',
    });
    document.documentElement.appendChild(cursor);
    const move = (x, y) => {
        cursor.style.display = 'block';
        cursor.style.left = x + 'px';
        cursor.style.top = y + 'px';
    };
    window.__tabpilotMoveCursor = move;
    document.addEventListener('mousemove', (e) => move(e.clientX, e.clientY), { passive: true });
    return true;
}"#;

/// True when the page text or title carries one of the given error markers.
pub const DETECT_ERROR_PAGE: &str = r#"(markers) => {
    if (window.location.protocol === 'chrome-error:') return true;
    const text = (document.body && document.body.innerText) || '';
    const title = document.title || '';
    return markers.some((m) => text.includes(m) || title.includes(m));
}"#;

/// Click the first organic search result. Returns its href, or null.
pub const CLICK_FIRST_RESULT: &str = r#"(selectors) => {
    for (const selector of selectors) {
        let link = null;
        try {
            link = document.querySelector(selector);
        } catch (e) {
            continue;
        }
        if (link && link.closest) link = link.closest('a[href]') || link;
        if (link && link.href) {
            const href = link.href;
            link.click();
            return href;
        }
    }
    return null;
}"#;

/// Locate a search box, fill it, and submit. Returns `{success, method}`.
pub const SEARCH: &str = r#"(query, tiers, submitLabels) => {
    const visible = (el) => {
        const rect = el.getBoundingClientRect();
        const style = window.getComputedStyle(el);
        return rect.width > 0 && rect.height > 0 &&
            style.visibility !== 'hidden' && style.display !== 'none' && !el.disabled;
    };
    let input = null;
    for (const tier of tiers) {
        for (const selector of tier) {
            let found = [];
            try {
                found = Array.from(document.querySelectorAll(selector));
            } catch (e) {
                continue;
            }
            input = found.find(visible) || null;
            if (input) break;
        }
        if (input) break;
    }
    if (!input) return { success: false, method: null };

    input.focus();
    input.value = query;
    input.dispatchEvent(new Event('input', { bubbles: true }));
    input.dispatchEvent(new Event('change', { bubbles: true }));

    const form = input.form || input.closest('form');
    if (form) {
        const buttons = Array.from(form.querySelectorAll(
            'button, input[type="submit"], input[type="image"], [role="button"]'));
        const button = buttons.find((b) => {
            if (!visible(b)) return false;
            if (b.type === 'submit') return true;
            const label = ((b.getAttribute('aria-label') || '') + ' ' + (b.innerText || b.value || '')).toLowerCase();
            return submitLabels.some((l) => label.includes(l));
        });
        if (button) {
            button.click();
            return { success: true, method: 'button' };
        }
        if (typeof form.requestSubmit === 'function') {
            form.requestSubmit();
        } else {
            form.submit();
        }
        return { success: true, method: 'form' };
    }

    const init = { key: 'Enter', code: 'Enter', keyCode: 13, which: 13, bubbles: true, cancelable: true };
    input.dispatchEvent(new KeyboardEvent('keydown', init));
    input.dispatchEvent(new KeyboardEvent('keypress', init));
    input.dispatchEvent(new KeyboardEvent('keyup', init));
    return { success: true, method: 'enter' };
}"#;

/// Scroll the page. Returns the resulting scroll offset.
pub const SCROLL: &str = r#"(direction, amount) => {
    const height = Math.max(
        document.body ? document.body.scrollHeight : 0,
        document.documentElement ? document.documentElement.scrollHeight : 0);
    switch (direction) {
        case 'up':
            window.scrollBy({ top: -amount, behavior: 'smooth' });
            break;
        case 'down':
            window.scrollBy({ top: amount, behavior: 'smooth' });
            break;
        case 'top':
            window.scrollTo({ top: 0, behavior: 'smooth' });
            break;
        case 'bottom':
            window.scrollTo({ top: height, behavior: 'smooth' });
            break;
    }
    return { x: window.scrollX, y: window.scrollY };
}"#;

/// In-page text search with a text-node walk as fallback. Returns true when found.
pub const FIND_TEXT: &str = r#"(text) => {
    if (typeof window.find === 'function') {
        const selection = window.getSelection();
        if (selection) selection.removeAllRanges();
        if (window.find(text, false, false, true, false, false, false)) {
            const node = selection && selection.anchorNode;
            const el = node && (node.nodeType === 1 ? node : node.parentElement);
            if (el) el.scrollIntoView({ behavior: 'smooth', block: 'center' });
            return true;
        }
    }
    const needle = text.toLowerCase();
    const walker = document.createTreeWalker(document.body || document.documentElement, NodeFilter.SHOW_TEXT);
    let node;
    while ((node = walker.nextNode())) {
        if ((node.nodeValue || '').toLowerCase().includes(needle) && node.parentElement) {
            const el = node.parentElement;
            el.scrollIntoView({ behavior: 'smooth', block: 'center' });
            const previous = el.style.outline;
            el.style.outline = '3px solid #ffb000';
            setTimeout(() => { el.style.outline = previous; }, 2000);
            return true;
        }
    }
    return false;
}"#;

/// Tag visible elements in scope and describe them.
///
/// Scope `clickable` covers links, buttons, role=button and submit controls.
/// Scope `all` covers any visible element carrying text or a label.
pub const COLLECT_CANDIDATES: &str = r#"(scope) => {
    const ATTR = 'data-tabpilot-idx';
    const LIMIT = 2000;
    document.querySelectorAll('[' + ATTR + ']').forEach((el) => el.removeAttribute(ATTR));

    const clickable = 'a, button, [role="button"], [role="link"], [role="menuitem"], ' +
        'input[type="submit"], input[type="button"], input[type="image"], [onclick]';
    const pool = scope === 'clickable'
        ? document.querySelectorAll(clickable)
        : document.querySelectorAll('body *:not(script):not(style):not(noscript):not(svg *)');

    const clean = (s) => (s || '').replace(/\s+/g, ' ').trim().slice(0, 300);
    const visible = (el) => {
        const rect = el.getBoundingClientRect();
        if (rect.width === 0 || rect.height === 0) return false;
        const style = window.getComputedStyle(el);
        return style.visibility !== 'hidden' && style.display !== 'none' && style.opacity !== '0';
    };

    const out = [];
    for (const el of pool) {
        if (out.length >= LIMIT) break;
        if (!visible(el)) continue;
        const tag = el.tagName.toLowerCase();
        const isValueButton = tag === 'input' && ['submit', 'button', 'reset'].includes(el.type);
        let text = isValueButton ? clean(el.value) : clean(el.innerText || el.textContent);
        if (scope !== 'clickable') {
            const own = Array.from(el.childNodes)
                .filter((n) => n.nodeType === 3)
                .map((n) => n.nodeValue)
                .join(' ');
            text = clean(own) || (el.children.length === 0 ? text : '');
        }
        const desc = {
            index: out.length,
            tag,
            text,
            ariaLabel: el.getAttribute('aria-label'),
            title: el.getAttribute('title'),
            alt: el.getAttribute('alt'),
            placeholder: el.getAttribute('placeholder'),
        };
        if (!desc.text && !desc.ariaLabel && !desc.title && !desc.alt && !desc.placeholder) continue;
        el.setAttribute(ATTR, String(desc.index));
        out.push(desc);
    }
    return out;
}"#;

/// Scroll a tagged candidate into view, wait, then click it.
///
/// When `click()` throws, the pointer and mouse event sequence is dispatched
/// instead. Returns false only when both fail.
pub const CLICK_CANDIDATE: &str = r#"async (index, settleMs) => {
    const el = document.querySelector('[data-tabpilot-idx="' + index + '"]');
    if (!el) return false;
    el.scrollIntoView({ behavior: 'smooth', block: 'center' });
    await new Promise((resolve) => setTimeout(resolve, settleMs));
    const rect = el.getBoundingClientRect();
    const x = rect.left + rect.width / 2;
    const y = rect.top + rect.height / 2;
    if (window.__tabpilotMoveCursor) window.__tabpilotMoveCursor(x, y);
    const dispatchSequence = (target, x, y) => {
        const init = { bubbles: true, cancelable: true, view: window, clientX: x, clientY: y };
        target.dispatchEvent(new PointerEvent('pointerdown', init));
        target.dispatchEvent(new MouseEvent('mousedown', init));
        target.dispatchEvent(new PointerEvent('pointerup', init));
        target.dispatchEvent(new MouseEvent('mouseup', init));
        target.dispatchEvent(new MouseEvent('click', init));
    };
    try {
        el.click();
        return true;
    } catch (e) {
        try {
            dispatchSequence(el, x, y);
            return true;
        } catch (e2) {
            return false;
        }
    }
}"#;

/// Click whatever sits at a viewport point given as fractions of width and height.
/// Falls back to synthesized events like [`CLICK_CANDIDATE`].
pub const CLICK_AT_POINT: &str = r#"(rx, ry) => {
    const x = Math.round(rx * window.innerWidth);
    const y = Math.round(ry * window.innerHeight);
    if (window.__tabpilotMoveCursor) window.__tabpilotMoveCursor(x, y);
    const el = document.elementFromPoint(x, y);
    if (!el) return false;
    const dispatchSequence = (target, x, y) => {
        const init = { bubbles: true, cancelable: true, view: window, clientX: x, clientY: y };
        target.dispatchEvent(new PointerEvent('pointerdown', init));
        target.dispatchEvent(new MouseEvent('mousedown', init));
        target.dispatchEvent(new PointerEvent('pointerup', init));
        target.dispatchEvent(new MouseEvent('mouseup', init));
        target.dispatchEvent(new MouseEvent('click', init));
    };
    try {
        el.click();
        return true;
    } catch (e) {
        try {
            dispatchSequence(el, x, y);
            return true;
        } catch (e2) {
            return false;
        }
    }
}"#;

/// Last-resort click by text content or common label attributes.
pub const TEXT_CLICK_FALLBACK: &str = r#"(text) => {
    const needle = text.toLowerCase();
    const attr = (name) => (el) => (el.getAttribute(name) || '').toLowerCase().includes(needle);
    const strategies = [
        (el) => (el.textContent || '').toLowerCase().includes(needle),
        attr('aria-label'),
        attr('title'),
        attr('placeholder'),
        (el) => el.tagName === 'BUTTON' && (el.innerText || '').toLowerCase().includes(needle),
    ];
    const pool = Array.from(document.querySelectorAll(
        'a, button, [role="button"], input[type="submit"], [onclick], [class*="btn"], [class*="button"]'));
    for (const matches of strategies) {
        const el = pool.find(matches);
        if (el) {
            el.scrollIntoView({ block: 'center' });
            el.click();
            return true;
        }
    }
    return false;
}"#;

/// Type into the first visible text field, or the one whose label contains `target`.
pub const TYPE_TEXT: &str = r#"(text, target) => {
    const fields = Array.from(document.querySelectorAll(
        'input[type="text"], input[type="search"], input[type="email"], input[type="url"], ' +
        'input:not([type]), textarea, [contenteditable="true"]'));
    const visible = (el) => {
        const rect = el.getBoundingClientRect();
        const style = window.getComputedStyle(el);
        return rect.width > 0 && rect.height > 0 && style.visibility !== 'hidden' && !el.disabled;
    };
    const label = (el) => [
        el.getAttribute('aria-label'),
        el.getAttribute('placeholder'),
        el.getAttribute('name'),
        el.id,
        el.labels && el.labels[0] ? el.labels[0].innerText : '',
    ].join(' ').toLowerCase();

    let field = null;
    if (target) {
        const needle = target.toLowerCase();
        field = fields.find((el) => visible(el) && label(el).includes(needle)) || null;
    }
    if (!field) {
        const active = document.activeElement;
        field = active && fields.includes(active) ? active : fields.find(visible) || null;
    }
    if (!field) return { success: false, tag: null };

    field.focus();
    if (field.isContentEditable) {
        field.textContent = text;
    } else {
        field.value = text;
    }
    field.dispatchEvent(new Event('input', { bubbles: true }));
    field.dispatchEvent(new Event('change', { bubbles: true }));
    return { success: true, tag: field.tagName.toLowerCase() };
}"#;

/// Dispatch Enter on the focused element, submitting its form when it has one.
pub const PRESS_ENTER: &str = r#"() => {
    const el = document.activeElement;
    if (!el || el === document.body) return false;
    const init = { key: 'Enter', code: 'Enter', keyCode: 13, which: 13, bubbles: true, cancelable: true };
    const proceed = el.dispatchEvent(new KeyboardEvent('keydown', init));
    el.dispatchEvent(new KeyboardEvent('keypress', init));
    el.dispatchEvent(new KeyboardEvent('keyup', init));
    if (proceed && el.form && el.tagName === 'INPUT') {
        if (typeof el.form.requestSubmit === 'function') {
            el.form.requestSubmit();
        } else {
            el.form.submit();
        }
    }
    return true;
}"#;
