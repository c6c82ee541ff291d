/// Browser side of live reload, injected into served HTML pages.
/// Connects to the reload socket on the page's host, reloads the page on
/// `reload`, and re-fetches matching stylesheets on `css`.
pub fn generate_live_reload_script(port: u16) -> String {
    format!(
        r#"<script>
(function () {{
  'use strict';
  var url = (location.protocol === 'https:' ? 'wss://' : 'ws://') + location.hostname + ':{port}';
  var delay = 1000;

  function refreshStyles(path) {{
    var links = document.querySelectorAll('link[rel="stylesheet"]');
    var matched = false;
    for (var i = 0; i < links.length; i++) {{
      var link = links[i];
      var href = link.getAttribute('href') || '';
      if (href.split('?')[0].indexOf(path) === -1) continue;
      matched = true;
      var next = link.cloneNode();
      next.href = href.split('?')[0] + '?t=' + Date.now();
      next.onload = (function (old) {{ return function () {{ old.remove(); }}; }})(link);
      link.parentNode.insertBefore(next, link.nextSibling);
    }}
    if (!matched) location.reload();
  }}

  function connect() {{
    var socket = new WebSocket(url);
    socket.onopen = function () {{ delay = 1000; }};
    socket.onmessage = function (event) {{
      var message;
      try {{ message = JSON.parse(event.data); }} catch (e) {{ return; }}
      if (message.kind === 'reload') location.reload();
      else if (message.kind === 'css') refreshStyles(message.path);
    }};
    socket.onclose = function () {{
      setTimeout(connect, delay);
      delay = Math.min(delay * 2, 10000);
    }};
  }}

  connect();
}})();
</script>"#,
        port = port
    )
}
