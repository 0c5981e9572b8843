use crate::board::{Board, Loaded};
use crate::cell::html_escape;
use crate::view::SortState;

pub struct PageText<'a> {
    pub title: &'a str,
    pub intro: &'a [String],
    pub download_label: &'a str,
}

const DARK_CSS: &str = ":root{--bg:#0a0e13;--fg:#ffffff;--muted:#c0c4cc;--card:#0d131a;--border:#243041;--accent:#3b82f6;--head:#0c1118;--stripe:#0b0f14;--input:#091017}";
const LIGHT_CSS: &str = ":root{--bg:#f7fafc;--fg:#111827;--muted:#6b7280;--card:#ffffff;--border:#e5e7eb;--accent:#2563eb;--head:#f3f4f6;--stripe:#fbfdff;--input:#ffffff}";
const BASE_CSS: &str = " body{margin:0;background:var(--bg);color:var(--fg);font-family:Segoe UI,system-ui,-apple-system,Arial,sans-serif} a{color:var(--accent)} .container{max-width:1200px;margin:0 auto;padding:24px} .title{font-size:20px;font-weight:600;letter-spacing:.2px;margin-bottom:12px} .card{background:var(--card);border:1px solid var(--border);border-radius:10px;padding:14px;margin-bottom:16px} .intro p{margin:0 0 10px 0} .intro-link{font-weight:600} .search{display:flex;align-items:center;gap:12px;margin-bottom:16px} .search-title{font-weight:600} .search-field{flex:1;max-width:420px;padding:8px 10px;border-radius:8px;border:1px solid var(--border);background:var(--input);color:var(--fg)} .table{width:100%;border-collapse:separate;border-spacing:0;background:var(--card);border:1px solid var(--border);border-radius:10px;overflow:hidden} .table th{position:sticky;top:0;background:var(--head);text-align:left;font-weight:600;padding:10px;border-bottom:1px solid var(--border);cursor:pointer;user-select:none} .table td{padding:10px;border-bottom:1px solid var(--border);vertical-align:top;word-break:break-word} .table tr:nth-child(odd) td{background:var(--stripe)} .label{display:none;color:var(--muted)} .footer{margin-top:22px;color:var(--muted);font-size:12px} @media (max-width:700px){.table thead{display:none}.table tr,.table td{display:block}.label{display:inline}}";

const TABLE_SCRIPT: &str = "(function(){var table=document.getElementById('sheet');if(!table)return;var body=table.tBodies[0];var rows=Array.prototype.slice.call(body.rows);var search=document.getElementById('search');var heads=Array.prototype.slice.call(table.tHead.rows[0].cells);var sortCol=-1,sortDir=0;function low(s){return (s||'').toLowerCase();}function cmp(a,b){return a.localeCompare(b,undefined,{numeric:true,sensitivity:'base'});}function apply(){var q=low(search.value);var list=rows.filter(function(r){if(!q)return true;for(var i=0;i<r.cells.length;i++){if(low(r.cells[i].getAttribute('data-value')).indexOf(q)!==-1)return true;}return false;});if(sortDir!==0){list=list.slice().sort(function(a,b){var o=cmp(a.cells[sortCol].getAttribute('data-value')||'',b.cells[sortCol].getAttribute('data-value')||'');return sortDir>0?o:-o;});}while(body.firstChild)body.removeChild(body.firstChild);list.forEach(function(r){body.appendChild(r);});heads.forEach(function(h,i){var s=h.querySelector('.sort');if(s)s.textContent=i===sortCol?(sortDir>0?'ASC':'DESC'):'';});}heads.forEach(function(h,i){h.addEventListener('click',function(){if(sortCol!==i){sortCol=i;sortDir=1;}else if(sortDir===1){sortDir=-1;}else{sortCol=-1;sortDir=0;}apply();});});search.addEventListener('input',apply);})();";

pub fn render_html(board: &Board, page: &PageText<'_>, theme: crate::Theme) -> String {
    let empty = Loaded::default();
    let loaded = board.loaded().unwrap_or(&empty);
    let mut s = String::new();
    s.push_str("<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\"><meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">");
    s.push_str(&format!("<title>{}</title><style>", html_escape(page.title)));
    match theme {
        crate::Theme::Dark => s.push_str(DARK_CSS),
        crate::Theme::Light => s.push_str(LIGHT_CSS),
    }
    s.push_str(BASE_CSS);
    s.push_str("</style></head><body><div class=\"container\">");
    s.push_str(&format!("<div class=\"title\">{}</div>", html_escape(page.title)));
    s.push_str("<div class=\"card intro\">");
    for p in page.intro { s.push_str(&format!("<p>{}</p>", intro_markup(p))); }
    s.push_str(&format!("<div class=\"intro-link\"><a href=\"{}\">{}</a></div>", html_escape(&board.source().link_target()), html_escape(page.download_label)));
    s.push_str("</div>");
    s.push_str("<div class=\"search\"><div class=\"search-title\">Search</div><input id=\"search\" class=\"search-field\" type=\"search\" placeholder=\"Search all fields...\" autocomplete=\"off\"></div>");
    s.push_str("<table id=\"sheet\" class=\"table\"><thead><tr>");
    for c in &loaded.columns {
        s.push_str(&format!("<th>{}<span class=\"sort\">{}</span></th>", html_escape(&c.name), SortState::Unsorted.indicator()));
    }
    s.push_str("</tr></thead><tbody>");
    for r in &loaded.dataset.records {
        s.push_str("<tr>");
        for c in &loaded.columns {
            let shown = board.render(c, r);
            let raw = r.get(&c.name).unwrap_or("");
            s.push_str(&format!("<td data-value=\"{}\"><span class=\"label\">{}:</span> {}</td>", html_escape(raw), html_escape(&c.name), shown.to_html()));
        }
        s.push_str("</tr>");
    }
    s.push_str("</tbody></table>");
    s.push_str(&format!("<div class=\"footer\">{} rows · generated by SheetView {}</div>", loaded.dataset.len(), chrono::Local::now().format("%Y-%m-%d %H:%M")));
    s.push_str("</div><script>");
    s.push_str(&sort_script());
    s.push_str("</script></body></html>");
    s
}

/// Escapes an intro paragraph, then turns `**text**` into bold and `[label](url)` into a link.
/// Only http, https and mailto targets become links; anything else stays literal text.
pub fn intro_markup(text: &str) -> String {
    let escaped = html_escape(text);
    let mut out = String::new();
    let mut rest = escaped.as_str();
    while let Some(start) = rest.find("**") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("**") else { break };
        out.push_str(&inline_links(&rest[..start]));
        out.push_str(&format!("<strong>{}</strong>", inline_links(&after[..end])));
        rest = &after[end + 2..];
    }
    out.push_str(&inline_links(rest));
    out
}

fn inline_links(s: &str) -> String {
    let mut out = String::new();
    let mut rest = s;
    while let Some(open) = rest.find('[') {
        let tail = &rest[open + 1..];
        let Some(mid) = tail.find("](") else { break };
        let (label, after) = (&tail[..mid], &tail[mid + 2..]);
        let Some(close) = after.find(')') else { break };
        let href = &after[..close];
        out.push_str(&rest[..open]);
        if !label.contains('[') && is_link_target(href) {
            out.push_str(&format!("<a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">{}</a>", href, label));
            rest = &after[close + 1..];
        } else {
            out.push('[');
            rest = tail;
        }
    }
    out.push_str(rest);
    out
}

fn is_link_target(href: &str) -> bool {
    let l = href.to_ascii_lowercase();
    (l.starts_with("https://") || l.starts_with("http://") || l.starts_with("mailto:")) && !href.chars().any(char::is_whitespace)
}

/// Arrow indicators are injected here so the page and the terminal view agree on them.
fn sort_script() -> String {
    TABLE_SCRIPT
        .replace("'ASC'", &format!("'{}'", SortState::Ascending.indicator()))
        .replace("'DESC'", &format!("'{}'", SortState::Descending.indicator()))
}
